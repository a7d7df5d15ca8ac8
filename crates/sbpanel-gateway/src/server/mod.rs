//! Gateway Server
//!
//! HTTP server exposing the panel API under a configurable base path.
//! Self-contained with dependency injection for clean architecture.

mod dependencies;
mod handlers;
pub mod logging_middleware;
pub mod rate_limit;
mod service_container;
mod startup;
mod state;

use handlers::AppState;

pub use dependencies::{DependenciesBuilder, GatewayDependencies, DEFAULT_ADMIN_PASSWORD};
pub use service_container::ServiceContainer;
pub use startup::{StartupOrchestrator, StartupReport, DEFAULT_ADMIN_USER};
pub use state::{Session, SessionStore, TokenCache};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{clients, handlers as api_handlers};
use crate::auth;

/// Uploaded databases may be larger than axum's default body limit
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Gateway server configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Prefix of every API route
    pub base_path: String,
    /// Enable CORS for browser access
    pub enable_cors: bool,
    /// Lifetime of a login session
    pub session_ttl: Duration,
    /// Pause between a `restartApp` response and the restart
    pub restart_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2095,
            base_path: "/api".to_string(),
            enable_cors: false,
            session_ttl: Duration::from_secs(24 * 60 * 60),
            restart_delay: Duration::from_secs(3),
        }
    }
}

impl GatewayConfig {
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    /// Base path with a leading slash and without a trailing one; empty for `/`
    pub fn api_prefix(&self) -> String {
        let trimmed = self.base_path.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }
}

/// Panel Gateway Server
///
/// All external dependencies are injected through the constructor.
pub struct GatewayServer {
    config: GatewayConfig,
    services: ServiceContainer,
    restart: CancellationToken,
}

impl GatewayServer {
    /// Create a new gateway server
    ///
    /// Cancelling `restart` (from `restartApp` or the host) stops the server
    /// gracefully.
    pub fn new(
        config: GatewayConfig,
        dependencies: GatewayDependencies,
        restart: CancellationToken,
    ) -> Self {
        info!("[Gateway] Initializing with dependency injection...");
        let services = ServiceContainer::initialize(&dependencies, &config, restart.clone());
        info!("[Gateway] Services initialized successfully");

        Self {
            config,
            services,
            restart,
        }
    }

    pub fn services(&self) -> &ServiceContainer {
        &self.services
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the startup steps (admin account, registry, token cache)
    pub async fn start(&self) -> Result<StartupReport> {
        self.services.startup_orchestrator.run().await
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        let services = Arc::new(self.services.clone());
        let app_state = AppState {
            services: services.clone(),
        };

        // Static client routes take precedence over the action parameter
        let api = Router::new()
            .route("/addClient", post(clients::add_client))
            .route("/updateClient", post(clients::update_client))
            .route("/delClient", post(clients::delete_client))
            .route(
                "/{action}",
                post(api_handlers::post_action).get(api_handlers::get_action),
            )
            .route_layer(middleware::from_fn_with_state(
                services.clone(),
                auth::auth_gate,
            ));

        let prefix = self.config.api_prefix();
        let router = Router::new().route("/health", get(handlers::health));
        let router = if prefix.is_empty() {
            router.merge(api)
        } else {
            router.nest(&prefix, api)
        };

        let rate_limiter = rate_limit::default_login_rate_limiter();

        let mut router = router
            .with_state(app_state)
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(
                logging_middleware::http_logging_middleware,
            ))
            .layer(axum::Extension(rate_limiter))
            .layer(middleware::from_fn(rate_limit::rate_limit_middleware));

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    /// Run the gateway server until the restart token is cancelled
    pub async fn run(self) -> Result<()> {
        let addr = self.config.addr()?;
        self.start().await?;

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!(
            "[Gateway] Listening on http://{}{}",
            addr,
            self.config.api_prefix()
        );
        info!(
            "[Gateway] CORS: {}",
            if self.config.enable_cors {
                "enabled"
            } else {
                "disabled"
            }
        );

        let restart = self.restart.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { restart.cancelled().await })
            .await
            .context("Gateway server error")?;

        info!("[Gateway] Stopped");
        Ok(())
    }
}
