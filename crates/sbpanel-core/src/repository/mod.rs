//! Repository traits for data access
//!
//! These traits define the interface for data storage without specifying
//! the implementation (SQLite, in-memory, etc.)

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::domain::{
    ApiToken, ChangeQuery, ChangeRecord, Client, ConfigKind, ConfigObject, Inbound, NewApiToken,
    StatsQuery, StatsRecord, User,
};

/// Result type for repository operations
pub type RepoResult<T> = anyhow::Result<T>;

/// Inbound repository trait
#[async_trait]
pub trait InboundRepository: Send + Sync {
    /// Get all inbounds ordered by id
    async fn list(&self) -> RepoResult<Vec<Inbound>>;

    /// Get an inbound by ID
    async fn get(&self, id: i64) -> RepoResult<Option<Inbound>>;

    /// Create an inbound, returning the assigned ID
    async fn create(&self, inbound: &Inbound) -> RepoResult<i64>;

    /// Replace an inbound (tag, protocol, listen, settings)
    async fn update(&self, inbound: &Inbound) -> RepoResult<()>;

    /// Replace only the client list of an inbound
    async fn update_clients(&self, id: i64, clients: &[Client]) -> RepoResult<()>;

    /// Delete an inbound
    async fn delete(&self, id: i64) -> RepoResult<()>;
}

/// Outbound / endpoint / tls object repository trait
#[async_trait]
pub trait ConfigObjectRepository: Send + Sync {
    /// List objects of a kind ordered by tag
    async fn list(&self, kind: ConfigKind) -> RepoResult<Vec<ConfigObject>>;

    /// Create or replace an object
    async fn upsert(&self, object: &ConfigObject) -> RepoResult<()>;

    /// Delete an object, returning whether it existed
    async fn delete(&self, kind: ConfigKind, tag: &str) -> RepoResult<bool>;
}

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list(&self) -> RepoResult<Vec<User>>;

    async fn get(&self, id: i64) -> RepoResult<Option<User>>;

    async fn get_by_username(&self, username: &str) -> RepoResult<Option<User>>;

    /// Create a user with an already hashed password
    async fn create(&self, username: &str, password_hash: &str) -> RepoResult<User>;

    /// Replace username and password hash
    async fn update_credentials(
        &self,
        id: i64,
        username: &str,
        password_hash: &str,
    ) -> RepoResult<()>;

    /// Record a successful login
    async fn record_login(&self, id: i64, at: i64) -> RepoResult<()>;
}

/// API token repository trait
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// All persisted tokens (source of the token cache)
    async fn list(&self) -> RepoResult<Vec<ApiToken>>;

    async fn list_for_user(&self, user_id: i64) -> RepoResult<Vec<ApiToken>>;

    async fn create(&self, token: &NewApiToken) -> RepoResult<ApiToken>;

    /// Delete a token, returning whether it existed
    async fn delete(&self, id: i64) -> RepoResult<bool>;
}

/// Panel settings repository trait
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn all(&self) -> RepoResult<BTreeMap<String, String>>;

    async fn get(&self, key: &str) -> RepoResult<Option<String>>;

    async fn set_many(&self, values: &BTreeMap<String, String>) -> RepoResult<()>;
}

/// Change log repository trait
#[async_trait]
pub trait ChangeRepository: Send + Sync {
    async fn record(&self, change: &ChangeRecord) -> RepoResult<()>;

    /// Newest first
    async fn list(&self, query: &ChangeQuery) -> RepoResult<Vec<ChangeRecord>>;

    /// Unix time of the newest change, if any
    async fn last_change(&self) -> RepoResult<Option<i64>>;
}

/// Traffic stats repository trait
#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn record_many(&self, records: &[StatsRecord]) -> RepoResult<()>;

    /// Oldest first
    async fn list(&self, query: &StatsQuery) -> RepoResult<Vec<StatsRecord>>;

    /// Distinct tags of `resource` that moved traffic since `since` (unix seconds)
    async fn active_tags(&self, resource: &str, since: i64) -> RepoResult<Vec<String>>;
}
