//! Trace Context - Request correlation and structured logging
//!
//! Generates short trace IDs and provides the per-request span.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, info_span, Span};

/// Global request counter for trace ID generation
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a short, unique trace ID for this request
/// Format: 6 hex characters (e.g., "a1b2c3")
pub fn generate_trace_id() -> String {
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);

    let mixed = counter.wrapping_add(timestamp);
    format!("{:06x}", mixed & 0xFFFFFF)
}

/// Trace context for a single request
#[derive(Debug, Clone)]
pub struct TraceContext {
    /// Unique trace ID (6 hex chars)
    pub trace_id: String,
    pub method: String,
    pub path: String,
    /// Panel action name (last path segment under the API base path)
    pub action: Option<String>,
    pub started_at: std::time::Instant,
}

impl TraceContext {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            trace_id: generate_trace_id(),
            method: method.to_string(),
            path: path.to_string(),
            action: None,
            started_at: std::time::Instant::now(),
        }
    }

    pub fn with_action(mut self, action: Option<String>) -> Self {
        self.action = action;
        self
    }

    /// Get elapsed time since request started
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Request span builder for structured logging
pub struct RequestSpan;

impl RequestSpan {
    /// Create a tracing span for an incoming request
    pub fn enter(ctx: &TraceContext) -> Span {
        info_span!(
            "request",
            trace_id = %ctx.trace_id,
            method = %ctx.method,
            path = %ctx.path,
        )
    }

    /// Log request entry (single consolidated line)
    pub fn log_entry(ctx: &TraceContext) {
        match ctx.action.as_deref() {
            Some(action) => info!(
                trace_id = %ctx.trace_id,
                "→ {} {} action={}",
                ctx.method,
                ctx.path,
                action
            ),
            None => info!(
                trace_id = %ctx.trace_id,
                "→ {} {}",
                ctx.method,
                ctx.path
            ),
        }
    }

    /// Log request completion (single consolidated line)
    pub fn log_exit(ctx: &TraceContext, status: u16, detail: Option<&str>) {
        let elapsed = ctx.elapsed_ms();

        match detail {
            Some(d) => info!(
                trace_id = %ctx.trace_id,
                "← {} {} ({}ms)",
                status,
                d,
                elapsed
            ),
            None => info!(
                trace_id = %ctx.trace_id,
                "← {} ({}ms)",
                status,
                elapsed
            ),
        }
    }
}
