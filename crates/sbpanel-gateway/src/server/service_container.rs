//! Service Container - holds all initialized services
//!
//! Services are created once per gateway run and shared by every request.

use std::sync::Arc;

use sbpanel_core::ClientRegistry;
use tokio_util::sync::CancellationToken;

use super::dependencies::GatewayDependencies;
use super::state::{SessionStore, TokenCache};
use super::{GatewayConfig, StartupOrchestrator};
use crate::services::ApiService;

/// Container for all Gateway services
#[derive(Clone)]
pub struct ServiceContainer {
    /// Inbounds and their client rosters
    pub registry: Arc<ClientRegistry>,

    /// Cookie sessions
    pub sessions: Arc<SessionStore>,

    /// API token snapshot consulted by the auth gate
    pub tokens: Arc<TokenCache>,

    /// Operations behind the action tables
    pub api: Arc<ApiService>,

    /// Startup orchestrator for initialization tasks
    pub startup_orchestrator: Arc<StartupOrchestrator>,

    /// Gateway dependencies (for accessing repositories, etc.)
    pub dependencies: GatewayDependencies,
}

impl ServiceContainer {
    /// Initialize all services from dependencies
    pub fn initialize(
        dependencies: &GatewayDependencies,
        config: &GatewayConfig,
        restart: CancellationToken,
    ) -> Self {
        let registry = Arc::new(ClientRegistry::new(dependencies.inbound_repo.clone()));
        let sessions = Arc::new(SessionStore::new(config.session_ttl));
        let tokens = Arc::new(TokenCache::new());

        let api = Arc::new(ApiService::new(
            dependencies.clone(),
            registry.clone(),
            sessions.clone(),
            tokens.clone(),
            restart,
            config.restart_delay,
        ));

        let startup_orchestrator = Arc::new(StartupOrchestrator::new(
            dependencies.clone(),
            registry.clone(),
            tokens.clone(),
        ));

        Self {
            registry,
            sessions,
            tokens,
            api,
            startup_orchestrator,
            dependencies: dependencies.clone(),
        }
    }
}
