//! HTTP Request/Response Logging Middleware
//!
//! Centralized logging with trace IDs for request correlation.
//! Uses TraceContext for consistent, non-repetitive logging.

use axum::{body::Body, extract::Request, http::StatusCode, middleware::Next, response::Response};
use http_body_util::BodyExt;
use tracing::{debug, warn, Instrument};

use crate::logging::{RequestSpan, TraceContext};

/// Maximum body size to log (64KB)
const MAX_BODY_LOG_SIZE: usize = 64 * 1024;

/// Actions whose bodies carry credentials
const SENSITIVE_ACTIONS: &[&str] = &["login", "changePass"];

/// Actions whose bodies are binary or too large to be useful
const SKIP_BODY_ACTIONS: &[&str] = &["importdb", "getdb"];

/// Last path segment, the action name for API routes
pub fn action_name(path: &str) -> Option<&str> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// Check if a path carries credentials
pub fn is_sensitive_path(path: &str) -> bool {
    action_name(path).is_some_and(|a| SENSITIVE_ACTIONS.contains(&a))
}

fn should_skip_body(path: &str) -> bool {
    action_name(path).is_some_and(|a| SKIP_BODY_ACTIONS.contains(&a))
}

/// Format bytes as string - compact version
pub fn format_body(bytes: &[u8], redact: bool) -> String {
    if redact {
        return "[REDACTED]".to_string();
    }

    if bytes.is_empty() {
        return "[empty]".to_string();
    }

    if bytes.len() > MAX_BODY_LOG_SIZE {
        return format!("[{} bytes]", bytes.len());
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
                return serde_json::to_string(&json).unwrap_or_else(|_| text.to_string());
            }
            match text.char_indices().nth(200) {
                Some((cut, _)) => format!("{}...", &text[..cut]),
                None => text.to_string(),
            }
        }
        Err(_) => format!("[binary: {} bytes]", bytes.len()),
    }
}

/// Summary of an envelope response: `failed: <message>` for failures
pub fn format_envelope(bytes: &[u8]) -> Option<String> {
    let json: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    match json.get("status").and_then(|s| s.as_str())? {
        "failed" => Some(format!(
            "failed: {}",
            json.get("message").and_then(|m| m.as_str()).unwrap_or("?")
        )),
        other => Some(other.to_string()),
    }
}

/// Logging middleware for requests and responses
///
/// Generates a trace_id and logs a single entry/exit line per request.
pub async fn http_logging_middleware(request: Request, next: Next) -> Result<Response, StatusCode> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let is_sensitive = is_sensitive_path(&path);
    let skip_body = should_skip_body(&path);

    let ctx = TraceContext::new(&method, &path).with_action(action_name(&path).map(String::from));
    let span = RequestSpan::enter(&ctx);

    async move {
        RequestSpan::log_entry(&ctx);

        let (mut parts, body) = request.into_parts();
        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(trace_id = %ctx.trace_id, "Failed to read request body: {}", e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        if !skip_body && !body_bytes.is_empty() {
            debug!(
                trace_id = %ctx.trace_id,
                body = %format_body(&body_bytes, is_sensitive),
                "Request body"
            );
        }

        // Store trace context for downstream middleware
        parts.extensions.insert(ctx.clone());
        let request = Request::from_parts(parts, Body::from(body_bytes));

        let response = next.run(request).await;

        let (parts, body) = response.into_parts();
        let status = parts.status;
        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(trace_id = %ctx.trace_id, "Failed to read response body: {}", e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let summary = if skip_body {
            None
        } else {
            format_envelope(&body_bytes)
        };
        RequestSpan::log_exit(&ctx, status.as_u16(), summary.as_deref());

        Ok(Response::from_parts(parts, Body::from(body_bytes)))
    }
    .instrument(span)
    .await
}
