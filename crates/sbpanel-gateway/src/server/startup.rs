//! Startup Orchestrator - Handles Gateway initialization tasks
//!
//! Keeps GatewayServer focused on serving requests, not initialization.

use std::sync::Arc;

use anyhow::{Context, Result};
use sbpanel_core::ClientRegistry;
use tracing::{info, warn};

use super::dependencies::GatewayDependencies;
use super::state::TokenCache;
use crate::auth::hash_password;

/// Username of the account created on an empty database
pub const DEFAULT_ADMIN_USER: &str = "admin";

/// What startup found and prepared
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartupReport {
    /// A default admin account was created
    pub admin_created: bool,
    pub inbounds: usize,
    pub tokens: usize,
}

/// Orchestrates startup tasks for the Gateway
pub struct StartupOrchestrator {
    dependencies: GatewayDependencies,
    registry: Arc<ClientRegistry>,
    tokens: Arc<TokenCache>,
}

impl StartupOrchestrator {
    pub fn new(
        dependencies: GatewayDependencies,
        registry: Arc<ClientRegistry>,
        tokens: Arc<TokenCache>,
    ) -> Self {
        Self {
            dependencies,
            registry,
            tokens,
        }
    }

    /// Create the admin account when no user exists yet
    pub async fn ensure_admin_user(&self) -> Result<bool> {
        let users = self.dependencies.user_repo.list().await?;
        if !users.is_empty() {
            return Ok(false);
        }

        if self.dependencies.admin_password == super::dependencies::DEFAULT_ADMIN_PASSWORD {
            warn!("[Startup] Creating '{}' with the default password", DEFAULT_ADMIN_USER);
        } else {
            info!("[Startup] Creating '{}' account", DEFAULT_ADMIN_USER);
        }

        let hash = hash_password(&self.dependencies.admin_password)?;
        self.dependencies
            .user_repo
            .create(DEFAULT_ADMIN_USER, &hash)
            .await
            .context("Failed to create admin user")?;
        Ok(true)
    }

    /// Run every startup step in order
    ///
    /// Admin account, then the registry, then the token cache. Any failure
    /// aborts startup.
    pub async fn run(&self) -> Result<StartupReport> {
        info!("[Startup] Preparing gateway state...");

        let admin_created = self.ensure_admin_user().await?;
        let inbounds = self
            .registry
            .load()
            .await
            .context("Failed to load inbounds")?;
        let tokens = self
            .tokens
            .rebuild(
                self.dependencies.token_repo.as_ref(),
                self.dependencies.user_repo.as_ref(),
            )
            .await
            .context("Failed to build token cache")?;

        let report = StartupReport {
            admin_created,
            inbounds,
            tokens,
        };
        info!(
            "[Startup] Ready: {} inbounds, {} tokens{}",
            report.inbounds,
            report.tokens,
            if admin_created { ", admin created" } else { "" }
        );
        Ok(report)
    }
}
