//! Dependency Injection Container
//!
//! Provides a clean DI pattern for Gateway dependencies.
//! Makes testing easier and dependencies explicit.

use std::sync::Arc;

use sbpanel_core::{
    ChangeRepository, ConfigObjectRepository, InboundRepository, SettingsRepository,
    StatsRepository, TokenRepository, UserRepository,
};
use sbpanel_storage::{
    Database, SqliteChangeRepository, SqliteConfigObjectRepository, SqliteInboundRepository,
    SqliteSettingsRepository, SqliteStatsRepository, SqliteTokenRepository, SqliteUserRepository,
};
use tokio::sync::Mutex;

use crate::logging::LogBuffer;
use crate::services::CoreController;

/// Password of the admin user created on first start
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Dependency container for Gateway
#[derive(Clone)]
pub struct GatewayDependencies {
    // Repositories (Data Layer)
    pub inbound_repo: Arc<dyn InboundRepository>,
    pub config_repo: Arc<dyn ConfigObjectRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub token_repo: Arc<dyn TokenRepository>,
    pub settings_repo: Arc<dyn SettingsRepository>,
    pub change_repo: Arc<dyn ChangeRepository>,
    pub stats_repo: Arc<dyn StatsRepository>,

    /// Proxy engine
    pub core: Arc<dyn CoreController>,

    /// Backing database for export/import (absent with in-memory repositories)
    pub database: Option<Arc<Mutex<Database>>>,

    /// Recent log lines for the `logs` action
    pub log_buffer: Option<LogBuffer>,

    /// Password given to the admin user when no user exists yet
    pub admin_password: String,
}

/// Builder for GatewayDependencies
///
/// Repositories not set explicitly are created from the database.
pub struct DependenciesBuilder {
    inbound_repo: Option<Arc<dyn InboundRepository>>,
    config_repo: Option<Arc<dyn ConfigObjectRepository>>,
    user_repo: Option<Arc<dyn UserRepository>>,
    token_repo: Option<Arc<dyn TokenRepository>>,
    settings_repo: Option<Arc<dyn SettingsRepository>>,
    change_repo: Option<Arc<dyn ChangeRepository>>,
    stats_repo: Option<Arc<dyn StatsRepository>>,
    core: Option<Arc<dyn CoreController>>,
    database: Option<Arc<Mutex<Database>>>,
    log_buffer: Option<LogBuffer>,
    admin_password: Option<String>,
}

impl DependenciesBuilder {
    pub fn new() -> Self {
        Self {
            inbound_repo: None,
            config_repo: None,
            user_repo: None,
            token_repo: None,
            settings_repo: None,
            change_repo: None,
            stats_repo: None,
            core: None,
            database: None,
            log_buffer: None,
            admin_password: None,
        }
    }

    pub fn with_inbound_repo(mut self, repo: Arc<dyn InboundRepository>) -> Self {
        self.inbound_repo = Some(repo);
        self
    }

    pub fn with_config_repo(mut self, repo: Arc<dyn ConfigObjectRepository>) -> Self {
        self.config_repo = Some(repo);
        self
    }

    pub fn with_user_repo(mut self, repo: Arc<dyn UserRepository>) -> Self {
        self.user_repo = Some(repo);
        self
    }

    pub fn with_token_repo(mut self, repo: Arc<dyn TokenRepository>) -> Self {
        self.token_repo = Some(repo);
        self
    }

    pub fn with_settings_repo(mut self, repo: Arc<dyn SettingsRepository>) -> Self {
        self.settings_repo = Some(repo);
        self
    }

    pub fn with_change_repo(mut self, repo: Arc<dyn ChangeRepository>) -> Self {
        self.change_repo = Some(repo);
        self
    }

    pub fn with_stats_repo(mut self, repo: Arc<dyn StatsRepository>) -> Self {
        self.stats_repo = Some(repo);
        self
    }

    pub fn with_core(mut self, core: Arc<dyn CoreController>) -> Self {
        self.core = Some(core);
        self
    }

    pub fn with_database(mut self, db: Arc<Mutex<Database>>) -> Self {
        self.database = Some(db);
        self
    }

    pub fn with_log_buffer(mut self, logs: LogBuffer) -> Self {
        self.log_buffer = Some(logs);
        self
    }

    pub fn with_admin_password(mut self, password: impl Into<String>) -> Self {
        self.admin_password = Some(password.into());
        self
    }

    pub fn build(self) -> Result<GatewayDependencies, String> {
        let core = self.core.ok_or("core controller is required")?;
        let db = self.database.clone();

        // Fill a repository from the database, or fail naming it
        macro_rules! repo {
            ($field:ident, $sqlite:ident, $repo:ident) => {
                match (self.$field, db.as_ref()) {
                    (Some(repo), _) => repo,
                    (None, Some(db)) => Arc::new($sqlite::new(db.clone())) as Arc<dyn $repo>,
                    (None, None) => {
                        return Err(concat!(stringify!($field), " is required").to_string())
                    }
                }
            };
        }

        Ok(GatewayDependencies {
            inbound_repo: repo!(inbound_repo, SqliteInboundRepository, InboundRepository),
            config_repo: repo!(config_repo, SqliteConfigObjectRepository, ConfigObjectRepository),
            user_repo: repo!(user_repo, SqliteUserRepository, UserRepository),
            token_repo: repo!(token_repo, SqliteTokenRepository, TokenRepository),
            settings_repo: repo!(settings_repo, SqliteSettingsRepository, SettingsRepository),
            change_repo: repo!(change_repo, SqliteChangeRepository, ChangeRepository),
            stats_repo: repo!(stats_repo, SqliteStatsRepository, StatsRepository),
            core,
            database: self.database,
            log_buffer: self.log_buffer,
            admin_password: self
                .admin_password
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
        })
    }
}

impl Default for DependenciesBuilder {
    fn default() -> Self {
        Self::new()
    }
}
