/// Rate limiting for the public auth endpoints
///
/// Login, registration and the password-reset flow are reachable without a
/// session, so they are throttled per client IP with a keyed `governor`
/// limiter. State lives in [`RateLimiter`] inside `AppState`; each API process
/// keeps its own cells.
///
/// # Algorithm
///
/// GCRA via `governor`:
/// - A client may burst up to `requests_per_minute` requests
/// - Capacity comes back at `requests_per_minute / 60` per second
/// - Requests past the burst are blocked until the next cell is free
///
/// # Client identity
///
/// The peer address from `ConnectInfo` is the key. With
/// `TRUST_PROXY_HEADERS` set the right-most `X-Forwarded-For` hop is used
/// instead, which is the address the trusted proxy itself appended.
///
/// # Headers
///
/// Allowed responses carry `X-RateLimit-Limit` and `X-RateLimit-Remaining`.
/// Blocked requests get 429 with `Retry-After`.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware::from_fn_with_state, routing::post, Router};
/// use wfahub_api::app::AppState;
/// use wfahub_api::middleware::rate_limit::auth_rate_limit_layer;
///
/// # fn example(state: AppState) {
/// let app: Router = Router::new()
///     .route("/login", post(handler))
///     .layer(from_fn_with_state(state.clone(), auth_rate_limit_layer))
///     .with_state(state);
/// # }
/// # async fn handler() {}
/// ```

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use governor::clock::{Clock, DefaultClock};
use governor::middleware::StateInformationMiddleware;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorRateLimiter};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Tracked clients before idle keys are dropped
const MAX_TRACKED_CLIENTS: usize = 10_000;

type KeyedLimiter = DefaultKeyedRateLimiter<String, StateInformationMiddleware>;

/// Rate limit configuration
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    /// Maximum requests per minute, also the burst size
    pub requests_per_minute: NonZeroU32,
}

impl RateLimit {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        RateLimit {
            requests_per_minute: NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN),
        }
    }

    fn quota(&self) -> Quota {
        Quota::per_minute(self.requests_per_minute)
    }
}

/// Result of rate limit check
#[derive(Debug, PartialEq)]
pub struct RateLimitResult {
    /// Whether request is allowed
    pub ok: bool,

    /// Requests left in the current burst
    pub remaining: u32,

    /// Seconds until a request would be allowed again
    pub retry_after: u64,
}

/// Per-client limiter shared by every clone of the state
#[derive(Clone)]
pub struct RateLimiter {
    limit: RateLimit,
    cells: Arc<KeyedLimiter>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        let cells = GovernorRateLimiter::keyed(limit.quota())
            .with_middleware::<StateInformationMiddleware>();

        Self {
            limit,
            cells: Arc::new(cells),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Takes one cell for `client`
    pub fn check(&self, client: &str) -> RateLimitResult {
        if self.cells.len() >= MAX_TRACKED_CLIENTS {
            self.cells.retain_recent();
        }

        match self.cells.check_key(&client.to_string()) {
            Ok(snapshot) => RateLimitResult {
                ok: true,
                remaining: snapshot.remaining_burst_capacity(),
                retry_after: 0,
            },
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                RateLimitResult {
                    ok: false,
                    remaining: 0,
                    retry_after: (wait.as_secs_f64().ceil() as u64).max(1),
                }
            }
        }
    }
}

/// Client key: the peer address, or the right-most `X-Forwarded-For` hop
/// when the proxy in front of the API is trusted
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware layer
///
/// # Errors
///
/// - 429 Too Many Requests: this client used up its burst
pub async fn auth_rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(
        request.headers(),
        peer,
        state.config.limits.trust_proxy_headers,
    );

    let result = state.rate_limiter.check(&client);
    if !result.ok {
        tracing::warn!(
            client = %client,
            path = %request.uri().path(),
            retry_after = result.retry_after,
            "Auth rate limit exceeded"
        );
        return Err(create_rate_limit_error(result));
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from(state.rate_limiter.limit().requests_per_minute.get()),
    );
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));

    Ok(response)
}

/// Creates a rate limit exceeded error response
fn create_rate_limit_error(result: RateLimitResult) -> ApiError {
    ApiError::RateLimitExceeded {
        retry_after: result.retry_after,
        message: format!(
            "Too many attempts. Try again in {} seconds",
            result.retry_after
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_per_minute() {
        assert_eq!(RateLimit::per_minute(10).requests_per_minute.get(), 10);
        assert_eq!(RateLimit::per_minute(0).requests_per_minute.get(), 1);
    }

    #[test]
    fn test_limiter_blocks_after_burst() {
        let limiter = RateLimiter::new(RateLimit::per_minute(3));

        for expected_remaining in [2, 1, 0] {
            let result = limiter.check("10.0.0.1");
            assert!(result.ok);
            assert_eq!(result.remaining, expected_remaining);
        }

        let blocked = limiter.check("10.0.0.1");
        assert!(!blocked.ok);
        assert_eq!(blocked.remaining, 0);
        // one cell every 20s at 3/min
        assert!((19..=20).contains(&blocked.retry_after), "{}", blocked.retry_after);

        // other clients have their own cells
        assert!(limiter.check("10.0.0.2").ok);
    }

    #[test]
    fn test_limiter_clones_share_state() {
        let limiter = RateLimiter::new(RateLimit::per_minute(1));
        let clone = limiter.clone();

        assert!(limiter.check("10.0.0.1").ok);
        assert!(!clone.check("10.0.0.1").ok);
    }

    #[test]
    fn test_client_key_uses_peer_by_default() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "192.168.1.7:52000".parse().unwrap();

        assert_eq!(client_key(&headers, Some(peer), false), "192.168.1.7");
        assert_eq!(client_key(&headers, None, false), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(client_key(&headers, Some(peer), false), "192.168.1.7");
    }

    #[test]
    fn test_client_key_behind_trusted_proxy() {
        let mut headers = HeaderMap::new();
        let proxy: SocketAddr = "10.0.0.2:443".parse().unwrap();

        // no header: still the peer
        assert_eq!(client_key(&headers, Some(proxy), true), "10.0.0.2");

        // the client can prepend anything; the proxy appends the real address
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8, 198.51.100.20"),
        );
        assert_eq!(client_key(&headers, Some(proxy), true), "198.51.100.20");

        headers.insert("x-forwarded-for", HeaderValue::from_static("  "));
        assert_eq!(client_key(&headers, Some(proxy), true), "10.0.0.2");
    }

    #[test]
    fn test_create_rate_limit_error() {
        let error = create_rate_limit_error(RateLimitResult {
            ok: false,
            remaining: 0,
            retry_after: 30,
        });

        match error {
            ApiError::RateLimitExceeded { retry_after, message } => {
                assert_eq!(retry_after, 30);
                assert!(message.contains("30 seconds"));
            }
            _ => panic!("Expected RateLimitExceeded error"),
        }
    }
}
