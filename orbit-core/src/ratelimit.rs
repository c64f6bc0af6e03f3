//! Fixed-window counters in Redis, dual-keyed by IP and API key. Fails open
//! on any Redis error — a rate limiter must never be the reason a request is
//! rejected when the coordination store is unavailable.

use std::time::{SystemTime, UNIX_EPOCH};

use redis::AsyncCommands;
use tracing::warn;

#[derive(Clone, Copy, Debug)]
pub struct WindowLimit {
    pub per_minute: u64,
    pub per_hour: u64,
}

impl Default for WindowLimit {
    fn default() -> Self {
        Self {
            per_minute: 60,
            per_hour: 1000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Ip,
    ApiKey,
}

impl Scope {
    fn as_str(&self) -> &'static str {
        match self {
            Scope::Ip => "ip",
            Scope::ApiKey => "apikey",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Window {
    Minute,
    Hour,
}

impl Window {
    fn seconds(&self) -> u64 {
        match self {
            Window::Minute => 60,
            Window::Hour => 3600,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Window::Minute => "min",
            Window::Hour => "hr",
        }
    }
}

/// Outcome of a [`RateLimiter::check`] call: always admits on Redis failure.
#[derive(Clone, Debug)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at_unix: u64,
    pub retry_after_secs: Option<u64>,
}

pub struct RateLimiter {
    conn: redis::aio::MultiplexedConnection,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn window_id(window: Window, now: u64) -> u64 {
    now / window.seconds()
}

fn counter_key(scope: Scope, window: Window, window_id: u64, identifier: &str) -> String {
    format!(
        "ratelimit:{}:{}:{}:{}",
        scope.as_str(),
        window.label(),
        window_id,
        identifier
    )
}

impl RateLimiter {
    pub async fn connect(redis_url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: redis::aio::MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// Increments both windows for `identifier` under `scope` and returns the
    /// tightest (most-restrictive) decision across minute/hour windows. On any
    /// Redis error, logs a warning and returns an always-allowed decision.
    pub async fn check(&self, scope: Scope, identifier: &str, limits: WindowLimit) -> RateLimitDecision {
        match self.check_inner(scope, identifier, limits).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, scope = scope.as_str(), "rate limiter: redis failure, failing open");
                RateLimitDecision {
                    allowed: true,
                    limit: limits.per_minute,
                    remaining: limits.per_minute,
                    reset_at_unix: unix_now() + Window::Minute.seconds(),
                    retry_after_secs: None,
                }
            }
        }
    }

    async fn check_inner(
        &self,
        scope: Scope,
        identifier: &str,
        limits: WindowLimit,
    ) -> redis::RedisResult<RateLimitDecision> {
        let now = unix_now();
        let mut conn = self.conn.clone();

        let minute = self
            .increment_window(&mut conn, scope, Window::Minute, now, identifier)
            .await?;
        let hour = self
            .increment_window(&mut conn, scope, Window::Hour, now, identifier)
            .await?;

        let minute_exceeded = minute > limits.per_minute;
        let hour_exceeded = hour > limits.per_hour;

        let minute_reset = (window_id(Window::Minute, now) + 1) * Window::Minute.seconds();
        let hour_reset = (window_id(Window::Hour, now) + 1) * Window::Hour.seconds();

        if minute_exceeded || hour_exceeded {
            let (limit, count, reset_at) = if minute_exceeded {
                (limits.per_minute, minute, minute_reset)
            } else {
                (limits.per_hour, hour, hour_reset)
            };
            return Ok(RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at_unix: reset_at,
                retry_after_secs: Some(reset_at.saturating_sub(now)),
            });
        }

        Ok(RateLimitDecision {
            allowed: true,
            limit: limits.per_minute,
            remaining: limits.per_minute.saturating_sub(minute),
            reset_at_unix: minute_reset,
            retry_after_secs: None,
        })
    }

    async fn increment_window(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        scope: Scope,
        window: Window,
        now: u64,
        identifier: &str,
    ) -> redis::RedisResult<u64> {
        let key = counter_key(scope, window, window_id(window, now), identifier);
        let count: u64 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(&key, window.seconds() as i64).await?;
        }
        Ok(count)
    }
}

/// Picks a client IP: first non-empty of `X-Forwarded-For`'s first entry,
/// `X-Real-IP`, the direct peer address, or `"unknown"`.
pub fn resolve_client_ip(
    x_forwarded_for: Option<&str>,
    x_real_ip: Option<&str>,
    peer_addr: Option<&str>,
) -> String {
    if let Some(xff) = x_forwarded_for {
        if let Some(first) = xff.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(ip) = x_real_ip.filter(|s| !s.is_empty()) {
        return ip.to_string();
    }
    if let Some(peer) = peer_addr.filter(|s| !s.is_empty()) {
        return peer.to_string();
    }
    "unknown".to_string()
}
