//! Simple per-action rate limiting middleware for the gateway.
//!
//! Uses a DashMap to track request counts per rule. Rules match on the path
//! suffix so they hold under any configured base path.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::Envelope;

/// Configuration for a rate-limited route.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed within the window.
    pub max_requests: u32,
    /// Time window duration.
    pub window: Duration,
}

/// Shared rate limiter state (clone-friendly via Arc).
#[derive(Clone)]
pub struct RateLimiter {
    /// Map from path suffix → (window_start, request_count).
    buckets: Arc<DashMap<String, (Instant, u32)>>,
    /// Configuration per path suffix.
    rules: Arc<Vec<(String, RateLimitConfig)>>,
}

impl RateLimiter {
    pub fn new(rules: Vec<(String, RateLimitConfig)>) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            rules: Arc::new(rules),
        }
    }

    /// Returns `true` if the request is within limits (allowed).
    fn check(&self, path: &str) -> bool {
        for (suffix, config) in self.rules.iter() {
            if path.ends_with(suffix.as_str()) {
                let mut entry = self
                    .buckets
                    .entry(suffix.clone())
                    .or_insert_with(|| (Instant::now(), 0));
                let (window_start, count) = entry.value_mut();

                if window_start.elapsed() >= config.window {
                    *window_start = Instant::now();
                    *count = 1;
                    return true;
                }

                if *count >= config.max_requests {
                    return false;
                }

                *count += 1;
                return true;
            }
        }
        true
    }
}

/// Axum middleware function for rate limiting.
pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    let limiter = request.extensions().get::<RateLimiter>().cloned();

    if let Some(limiter) = limiter {
        if !limiter.check(request.uri().path()) {
            return Envelope::failed("Rate limit exceeded. Please try again later.")
                .with_status(StatusCode::TOO_MANY_REQUESTS)
                .into_response();
        }
    }

    next.run(request).await
}

/// Login attempts: 10 per minute
pub fn default_login_rate_limiter() -> RateLimiter {
    RateLimiter::new(vec![(
        "/login".to_string(),
        RateLimitConfig {
            max_requests: 10,
            window: Duration::from_secs(60),
        },
    )])
}
