//! Fixed-bucket sliding-window rate limiting keyed by client.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::http::request::{client_key, ClientKey};
use crate::http::response::ApiResponse;
use crate::observability::metrics;

/// Outcome of [`RateLimiter::check_and_consume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

/// Per-key window: when it started and how many requests it has seen.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    count: u32,
}

/// Request-rate ceiling per client key.
///
/// Each key maps to `(window_start, count)`. A request against a window older
/// than `window` starts a fresh one; otherwise the count is incremented and
/// compared to `max_requests`. Bursts around window edges are tolerated.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(Duration::from_millis(config.window_ms), config.max_requests)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check_and_consume(&self, key: &str) -> RateDecision {
        self.check_and_consume_at(key, Instant::now())
    }

    /// Same as [`RateLimiter::check_and_consume`] with an explicit clock.
    pub fn check_and_consume_at(&self, key: &str, now: Instant) -> RateDecision {
        // The entry guard holds the shard lock for this key's read-modify-write.
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert(Window { start: now, count: 0 });
        let w = entry.value_mut();

        let elapsed = now.saturating_duration_since(w.start);
        if elapsed > self.window {
            w.start = now;
            w.count = 1;
            return RateDecision::Allowed;
        }

        w.count = w.count.saturating_add(1);
        if w.count <= self.max_requests {
            RateDecision::Allowed
        } else {
            RateDecision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            }
        }
    }

    /// Drop windows that expired more than one window ago relative to `now`.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.start) <= self.window);
        let removed = before.saturating_sub(self.windows.len());
        metrics::record_rate_limit_keys(self.windows.len());
        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Purge on a fixed interval (one window) until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.window);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.purge_expired_at(Instant::now());
                    tracing::debug!(removed, remaining = self.tracked_keys(), "Rate limit sweep");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// State for [`rate_limit_middleware`].
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub enabled: bool,
    pub trust_forwarded_for: bool,
}

/// Reject requests over the per-client ceiling with 429 and `Retry-After`.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request, state.trust_forwarded_for);
    request.extensions_mut().insert(ClientKey(key.clone()));

    if !state.enabled {
        return next.run(request).await;
    }

    match state.limiter.check_and_consume(&key) {
        RateDecision::Allowed => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            let secs = retry_after.as_secs().max(1);
            tracing::warn!(client = %key, retry_after_secs = secs, "Rate limit exceeded");
            metrics::record_rate_limited("client");

            let body: ApiResponse<()> = ApiResponse::failure("too many requests, slow down");
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_over_ceiling_is_limited() {
        let limiter = RateLimiter::new(Duration::from_millis(300_000), 100);
        let t0 = Instant::now();

        for i in 0..100 {
            let now = t0 + Duration::from_millis(i * 10);
            assert_eq!(limiter.check_and_consume_at("1.2.3.4|ua", now), RateDecision::Allowed);
        }
        for i in 100..110 {
            let now = t0 + Duration::from_millis(i * 10);
            assert!(matches!(
                limiter.check_and_consume_at("1.2.3.4|ua", now),
                RateDecision::Limited { .. }
            ));
        }
    }

    #[test]
    fn test_window_rolls_over() {
        let window = Duration::from_millis(300_000);
        let limiter = RateLimiter::new(window, 2);
        let t0 = Instant::now();

        assert_eq!(limiter.check_and_consume_at("k", t0), RateDecision::Allowed);
        assert_eq!(limiter.check_and_consume_at("k", t0), RateDecision::Allowed);
        match limiter.check_and_consume_at("k", t0 + Duration::from_millis(100_000)) {
            RateDecision::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_millis(200_000));
            }
            other => panic!("expected limit, got {:?}", other),
        }

        // exactly one window later is still the same window
        assert!(matches!(
            limiter.check_and_consume_at("k", t0 + window),
            RateDecision::Limited { .. }
        ));
        // past the window a fresh one starts
        assert_eq!(
            limiter.check_and_consume_at("k", t0 + window + Duration::from_millis(1)),
            RateDecision::Allowed
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let t0 = Instant::now();
        assert_eq!(limiter.check_and_consume_at("a", t0), RateDecision::Allowed);
        assert!(matches!(limiter.check_and_consume_at("a", t0), RateDecision::Limited { .. }));
        assert_eq!(limiter.check_and_consume_at("b", t0), RateDecision::Allowed);
    }

    #[test]
    fn test_purge_expired() {
        let window = Duration::from_secs(60);
        let limiter = RateLimiter::new(window, 10);
        let t0 = Instant::now();
        limiter.check_and_consume_at("old", t0);
        limiter.check_and_consume_at("new", t0 + Duration::from_secs(50));

        let removed = limiter.purge_expired_at(t0 + Duration::from_secs(61));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_concurrent_consumers_share_one_budget() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(300), 100));
        let now = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| limiter.check_and_consume_at("shared", now) == RateDecision::Allowed)
                        .count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 100);
    }
}
