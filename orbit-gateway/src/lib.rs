//! HTTP gateway for ORBIT: axum routes for chat, autocomplete, health and
//! models over the `orbit-core` pipeline.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

mod autocomplete;
mod bootstrap;
mod chat;
mod error;
mod health;
mod models;
mod ratelimit;
mod state;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

pub use state::AppState;

const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";

fn router(state: AppState) -> Router {
    Router::<AppState>::new()
        .merge(chat::router())
        .merge(autocomplete::router())
        .merge(health::router())
        .merge(models::router())
        .with_state(state)
}

/// Loads `config_path`, wires every component, and serves HTTP on an
/// existing listener. Used directly by tests (bind to 127.0.0.1:0, then
/// pass the listener in).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    config_path: &Path,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!(%addr, "ORBIT gateway listening");

    let config = orbit_config::load_config(config_path, None)?;
    orbit_config::build_config_summary(&config).print_to_stderr();
    let state = bootstrap::build_app_state(config)
        .await
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { e.into() })?;
    let draining = state.draining.clone();
    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(draining))
        .await?;
    Ok(())
}

/// Resolves once a ctrl-c or (on unix) SIGTERM is received, flipping
/// `draining` first so `/health` reflects the drain before in-flight
/// requests are given a chance to finish.
async fn shutdown_signal(draining: Arc<AtomicBool>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    draining.store(true, Ordering::Relaxed);
    info!("ORBIT gateway draining, waiting for in-flight requests to finish");
}

/// Runs the gateway. Listens on `addr` (default `127.0.0.1:8080`), loading
/// configuration from `config_path`.
pub async fn run_serve(
    addr: Option<&str>,
    config_path: &Path,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_HTTP_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, config_path).await
}
