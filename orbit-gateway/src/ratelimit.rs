//! Wires [`orbit_core::RateLimiter`] into the HTTP layer: resolves the
//! caller's IP from forwarding headers, checks the IP and (when available)
//! API-key scopes, and renders the `X-RateLimit-*` / `Retry-After` response
//! headers every route is expected to carry.

use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;

use orbit_core::{resolve_client_ip, RateLimitDecision, Scope, WindowLimit};

use crate::state::AppState;

/// Outcome of [`enforce`]: `Allowed`/`Limited` both carry the decision used
/// to render headers; `Skipped` means no limiter is configured or the path
/// is in `exclude_paths`, so no rate-limit headers are added at all.
pub enum Verdict {
    Allowed(RateLimitDecision),
    Limited(RateLimitDecision),
    Skipped,
}

/// Checks the IP scope unconditionally and the API-key scope when `api_key`
/// is given, returning whichever decision is the more restrictive.
pub async fn enforce(state: &AppState, path: &str, headers: &HeaderMap, api_key: Option<&str>) -> Verdict {
    if !state.config.security.rate_limiting.enabled {
        return Verdict::Skipped;
    }
    if state.config.security.rate_limiting.exclude_paths.iter().any(|p| p == path) {
        return Verdict::Skipped;
    }
    let Some(limiter) = &state.rate_limiter else {
        return Verdict::Skipped;
    };

    let ip = client_ip(headers);
    let ip_limits = WindowLimit {
        per_minute: state.config.security.rate_limiting.ip_limits.per_minute as u64,
        per_hour: state.config.security.rate_limiting.ip_limits.per_hour as u64,
    };
    let ip_decision = limiter.check(Scope::Ip, &ip, ip_limits).await;
    if !ip_decision.allowed {
        return Verdict::Limited(ip_decision);
    }

    let Some(api_key) = api_key else {
        return Verdict::Allowed(ip_decision);
    };
    let key_limits = WindowLimit {
        per_minute: state.config.security.rate_limiting.api_key_limits.per_minute as u64,
        per_hour: state.config.security.rate_limiting.api_key_limits.per_hour as u64,
    };
    let key_decision = limiter.check(Scope::ApiKey, api_key, key_limits).await;
    if !key_decision.allowed {
        return Verdict::Limited(key_decision);
    }
    Verdict::Allowed(key_decision)
}

/// First non-empty of `X-Forwarded-For`'s first entry, `X-Real-IP`, or
/// `"unknown"` — the direct peer address isn't available to handlers here.
fn client_ip(headers: &HeaderMap) -> String {
    let xff = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok());
    let real_ip = headers.get("x-real-ip").and_then(|v| v.to_str().ok());
    resolve_client_ip(xff, real_ip, None)
}

/// Stamps `X-RateLimit-Limit`/`-Remaining`/`-Reset` (and `Retry-After` when
/// present) onto `response`. A no-op when `verdict` is [`Verdict::Skipped`].
pub fn apply_headers(response: &mut Response, verdict: &Verdict) {
    let decision = match verdict {
        Verdict::Allowed(d) | Verdict::Limited(d) => d,
        Verdict::Skipped => return,
    };
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", header_value(decision.limit));
    headers.insert("x-ratelimit-remaining", header_value(decision.remaining));
    headers.insert("x-ratelimit-reset", header_value(decision.reset_at_unix));
    if let Some(retry_after) = decision.retry_after_secs {
        headers.insert("retry-after", header_value(retry_after));
    }
}

fn header_value(n: u64) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).expect("decimal digits are valid header bytes")
}
