//! Caller authentication for the panel API
//!
//! Browser callers carry a session cookie issued by `login`; programmatic
//! callers send an API token in the `Token` header. The gate resolves either
//! one and attaches the [`User`] to the request.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rand::RngCore;
use sbpanel_core::User;
use tracing::{debug, warn};

use crate::api::Envelope;
use crate::logging::TraceContext;
use crate::server::ServiceContainer;

/// Session cookie name
pub const SESSION_COOKIE: &str = "sbpanel_session";

/// Header carrying an API token
pub const TOKEN_HEADER: &str = "Token";

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(s) = value.to_str() else { continue };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name && !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

pub fn set_session_cookie(credential: &str, ttl: Duration) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        credential,
        ttl.as_secs()
    ))
    .ok()
}

pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("sbpanel_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Paths the gate lets through unauthenticated
pub fn is_exempt_path(path: &str) -> bool {
    path.ends_with("login") || path.ends_with("logout")
}

fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller from a session cookie or an API token
pub fn resolve_caller(services: &ServiceContainer, headers: &HeaderMap) -> Option<User> {
    if let Some(credential) = parse_cookie(headers, SESSION_COOKIE) {
        if let Some(user) = services.sessions.resolve(&credential) {
            return Some(user);
        }
    }
    token_from_headers(headers).and_then(|token| services.tokens.resolve(token))
}

/// Auth gate middleware for every API route
///
/// Rejects with 401 and a failed envelope before any handler runs.
pub async fn auth_gate(
    State(services): State<Arc<ServiceContainer>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // CORS preflight is answered by the outer CorsLayer when enabled
    if is_exempt_path(request.uri().path()) {
        return next.run(request).await;
    }

    let trace_id = request
        .extensions()
        .get::<TraceContext>()
        .map(|ctx| ctx.trace_id.clone())
        .unwrap_or_else(|| "??????".to_string());

    let Some(user) = resolve_caller(&services, request.headers()) else {
        warn!(trace_id = %trace_id, "[Auth] Rejected {}", request.uri().path());
        return Envelope::unauthorized().into_response();
    };

    debug!(trace_id = %trace_id, "[Auth] Caller '{}'", user.username);
    request.extensions_mut().insert(user);
    next.run(request).await
}
