//! Mock repository implementations for testing
//!
//! In-memory implementations of all repository traits for fast, isolated tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::bail;
use sbpanel_core::{
    repository::{
        ChangeRepository, ConfigObjectRepository, InboundRepository, RepoResult,
        SettingsRepository, StatsRepository, TokenRepository, UserRepository,
    },
    ApiToken, ChangeQuery, ChangeRecord, Client, ConfigKind, ConfigObject, Inbound, NewApiToken,
    StatsQuery, StatsRecord, User,
};
use sbpanel_gateway::{CoreController, CoreStatus, DependenciesBuilder};
use serde_json::Value;
use tokio::sync::Notify;

// ============================================================================
// MockInboundRepository
// ============================================================================

#[derive(Default)]
pub struct MockInboundRepository {
    inbounds: RwLock<BTreeMap<i64, Inbound>>,
    next_id: AtomicI64,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MockInboundRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inbound(self, inbound: Inbound) -> Self {
        self.next_id.fetch_max(inbound.id, Ordering::SeqCst);
        self.inbounds.write().unwrap().insert(inbound.id, inbound);
        self
    }

    /// Make every following write fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Persisted client ids of an inbound
    pub fn persisted_client_ids(&self, id: i64) -> Vec<String> {
        self.inbounds
            .read()
            .unwrap()
            .get(&id)
            .map(|i| i.settings.clients.iter().map(|c| c.id.clone()).collect())
            .unwrap_or_default()
    }

    fn check_write(&self) -> RepoResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("disk I/O error");
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl InboundRepository for MockInboundRepository {
    async fn list(&self) -> RepoResult<Vec<Inbound>> {
        Ok(self.inbounds.read().unwrap().values().cloned().collect())
    }

    async fn get(&self, id: i64) -> RepoResult<Option<Inbound>> {
        Ok(self.inbounds.read().unwrap().get(&id).cloned())
    }

    async fn create(&self, inbound: &Inbound) -> RepoResult<i64> {
        self.check_write()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = inbound.clone().with_id(id);
        self.inbounds.write().unwrap().insert(id, stored);
        Ok(id)
    }

    async fn update(&self, inbound: &Inbound) -> RepoResult<()> {
        self.check_write()?;
        self.inbounds
            .write()
            .unwrap()
            .insert(inbound.id, inbound.clone());
        Ok(())
    }

    async fn update_clients(&self, id: i64, clients: &[Client]) -> RepoResult<()> {
        self.check_write()?;
        let mut inbounds = self.inbounds.write().unwrap();
        let Some(inbound) = inbounds.get_mut(&id) else {
            bail!("inbound {} not found", id);
        };
        inbound.settings.clients = clients.to_vec();
        Ok(())
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        self.check_write()?;
        self.inbounds.write().unwrap().remove(&id);
        Ok(())
    }
}

// ============================================================================
// MockConfigObjectRepository
// ============================================================================

#[derive(Default)]
pub struct MockConfigObjectRepository {
    objects: RwLock<BTreeMap<(String, String), ConfigObject>>,
}

impl MockConfigObjectRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigObjectRepository for MockConfigObjectRepository {
    async fn list(&self, kind: ConfigKind) -> RepoResult<Vec<ConfigObject>> {
        Ok(self
            .objects
            .read()
            .unwrap()
            .values()
            .filter(|o| o.kind == kind)
            .cloned()
            .collect())
    }

    async fn upsert(&self, object: &ConfigObject) -> RepoResult<()> {
        self.objects.write().unwrap().insert(
            (object.kind.as_str().to_string(), object.tag.clone()),
            object.clone(),
        );
        Ok(())
    }

    async fn delete(&self, kind: ConfigKind, tag: &str) -> RepoResult<bool> {
        Ok(self
            .objects
            .write()
            .unwrap()
            .remove(&(kind.as_str().to_string(), tag.to_string()))
            .is_some())
    }
}

// ============================================================================
// MockUserRepository
// ============================================================================

#[derive(Default)]
pub struct MockUserRepository {
    users: RwLock<BTreeMap<i64, User>>,
    next_id: AtomicI64,
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn list(&self) -> RepoResult<Vec<User>> {
        Ok(self.users.read().unwrap().values().cloned().collect())
    }

    async fn get(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.users.read().unwrap().get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, username: &str, password_hash: &str) -> RepoResult<User> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut user = User::new(id, username);
        user.password_hash = password_hash.to_string();
        self.users.write().unwrap().insert(id, user.clone());
        Ok(user)
    }

    async fn update_credentials(
        &self,
        id: i64,
        username: &str,
        password_hash: &str,
    ) -> RepoResult<()> {
        let mut users = self.users.write().unwrap();
        let Some(user) = users.get_mut(&id) else {
            bail!("user {} not found", id);
        };
        user.username = username.to_string();
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn record_login(&self, id: i64, at: i64) -> RepoResult<()> {
        if let Some(user) = self.users.write().unwrap().get_mut(&id) {
            user.last_login = Some(at);
        }
        Ok(())
    }
}

// ============================================================================
// MockTokenRepository
// ============================================================================

/// Pauses one `list` call after it has read the store
#[derive(Clone, Default)]
pub struct ListHold {
    /// Notified once the held call has taken its copy
    pub reached: Arc<Notify>,
    /// Notify to let the held call return
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub struct MockTokenRepository {
    tokens: RwLock<BTreeMap<i64, ApiToken>>,
    next_id: AtomicI64,
    fail_list: AtomicBool,
    list_hold: Mutex<Option<ListHold>>,
}

impl MockTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `list` (the cache rebuild source) fail
    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.tokens.read().unwrap().len()
    }

    /// Hold the next `list` call until `release` is notified
    pub fn hold_next_list(&self) -> ListHold {
        let hold = ListHold::default();
        *self.list_hold.lock().unwrap() = Some(hold.clone());
        hold
    }
}

#[async_trait]
impl TokenRepository for MockTokenRepository {
    async fn list(&self) -> RepoResult<Vec<ApiToken>> {
        if self.fail_list.load(Ordering::SeqCst) {
            bail!("database is locked");
        }
        let tokens: Vec<ApiToken> = self.tokens.read().unwrap().values().cloned().collect();
        let hold = self.list_hold.lock().unwrap().take();
        if let Some(hold) = hold {
            hold.reached.notify_one();
            hold.release.notified().await;
        }
        Ok(tokens)
    }

    async fn list_for_user(&self, user_id: i64) -> RepoResult<Vec<ApiToken>> {
        Ok(self
            .tokens
            .read()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create(&self, token: &NewApiToken) -> RepoResult<ApiToken> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = ApiToken {
            id,
            token: token.token.clone(),
            desc: token.desc.clone(),
            expiry: token.expiry,
            user_id: token.user_id,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.tokens.write().unwrap().insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: i64) -> RepoResult<bool> {
        Ok(self.tokens.write().unwrap().remove(&id).is_some())
    }
}

// ============================================================================
// MockSettingsRepository
// ============================================================================

#[derive(Default)]
pub struct MockSettingsRepository {
    settings: RwLock<BTreeMap<String, String>>,
}

impl MockSettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsRepository for MockSettingsRepository {
    async fn all(&self) -> RepoResult<BTreeMap<String, String>> {
        Ok(self.settings.read().unwrap().clone())
    }

    async fn get(&self, key: &str) -> RepoResult<Option<String>> {
        Ok(self.settings.read().unwrap().get(key).cloned())
    }

    async fn set_many(&self, values: &BTreeMap<String, String>) -> RepoResult<()> {
        let mut settings = self.settings.write().unwrap();
        for (k, v) in values {
            settings.insert(k.clone(), v.clone());
        }
        Ok(())
    }
}

// ============================================================================
// MockChangeRepository
// ============================================================================

#[derive(Default)]
pub struct MockChangeRepository {
    changes: RwLock<Vec<ChangeRecord>>,
}

impl MockChangeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<ChangeRecord> {
        self.changes.read().unwrap().clone()
    }
}

#[async_trait]
impl ChangeRepository for MockChangeRepository {
    async fn record(&self, change: &ChangeRecord) -> RepoResult<()> {
        let mut changes = self.changes.write().unwrap();
        let mut change = change.clone();
        change.id = changes.len() as i64 + 1;
        changes.push(change);
        Ok(())
    }

    async fn list(&self, query: &ChangeQuery) -> RepoResult<Vec<ChangeRecord>> {
        let limit = if query.limit == 0 { 100 } else { query.limit };
        Ok(self
            .changes
            .read()
            .unwrap()
            .iter()
            .rev()
            .filter(|c| query.actor.as_ref().map_or(true, |a| &c.actor == a))
            .filter(|c| query.key.as_ref().map_or(true, |k| &c.key == k))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn last_change(&self) -> RepoResult<Option<i64>> {
        Ok(self.changes.read().unwrap().last().map(|c| c.date_time))
    }
}

// ============================================================================
// MockStatsRepository
// ============================================================================

#[derive(Default)]
pub struct MockStatsRepository {
    records: RwLock<Vec<StatsRecord>>,
}

impl MockStatsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsRepository for MockStatsRepository {
    async fn record_many(&self, records: &[StatsRecord]) -> RepoResult<()> {
        self.records.write().unwrap().extend_from_slice(records);
        Ok(())
    }

    async fn list(&self, query: &StatsQuery) -> RepoResult<Vec<StatsRecord>> {
        let since = chrono::Utc::now().timestamp() - query.hours.max(1) * 3600;
        Ok(self
            .records
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.date_time >= since)
            .filter(|r| query.resource.is_empty() || r.resource == query.resource)
            .filter(|r| query.tag.is_empty() || r.tag == query.tag)
            .cloned()
            .collect())
    }

    async fn active_tags(&self, resource: &str, since: i64) -> RepoResult<Vec<String>> {
        let mut tags: Vec<String> = self
            .records
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.resource == resource && r.date_time >= since && r.traffic > 0)
            .map(|r| r.tag.clone())
            .collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }
}

// ============================================================================
// MockCoreController
// ============================================================================

/// Records applied configurations instead of running a process
#[derive(Default)]
pub struct MockCoreController {
    running: AtomicBool,
    configs: RwLock<Vec<Value>>,
}

impl MockCoreController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn applied_configs(&self) -> Vec<Value> {
        self.configs.read().unwrap().clone()
    }
}

#[async_trait]
impl CoreController for MockCoreController {
    async fn restart(&self, config: &Value) -> anyhow::Result<()> {
        self.configs.write().unwrap().push(config.clone());
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn status(&self) -> CoreStatus {
        CoreStatus {
            running: self.running.load(Ordering::SeqCst),
            pid: None,
            started_at: None,
        }
    }

    async fn keypairs(&self, kind: &str, _option: &str) -> anyhow::Result<Vec<String>> {
        match kind {
            "reality" => Ok(vec![
                "PrivateKey: mock-private".to_string(),
                "PublicKey: mock-public".to_string(),
            ]),
            other => bail!("unknown key pair kind: {}", other),
        }
    }
}

// ============================================================================
// Test Helper: Create all mock repos as Arc
// ============================================================================

/// Collection of all mock repositories for test setup
pub struct MockRepositories {
    pub inbounds: Arc<MockInboundRepository>,
    pub config_objects: Arc<MockConfigObjectRepository>,
    pub users: Arc<MockUserRepository>,
    pub tokens: Arc<MockTokenRepository>,
    pub settings: Arc<MockSettingsRepository>,
    pub changes: Arc<MockChangeRepository>,
    pub stats: Arc<MockStatsRepository>,
    pub core: Arc<MockCoreController>,
}

impl MockRepositories {
    /// Create a fresh set of empty mock repositories
    pub fn new() -> Self {
        Self::with_inbounds(MockInboundRepository::new())
    }

    pub fn with_inbounds(inbounds: MockInboundRepository) -> Self {
        Self {
            inbounds: Arc::new(inbounds),
            config_objects: Arc::new(MockConfigObjectRepository::new()),
            users: Arc::new(MockUserRepository::new()),
            tokens: Arc::new(MockTokenRepository::new()),
            settings: Arc::new(MockSettingsRepository::new()),
            changes: Arc::new(MockChangeRepository::new()),
            stats: Arc::new(MockStatsRepository::new()),
            core: Arc::new(MockCoreController::new()),
        }
    }

    /// Builder wired to every mock (no database)
    pub fn dependencies_builder(&self) -> DependenciesBuilder {
        DependenciesBuilder::new()
            .with_inbound_repo(self.inbounds.clone())
            .with_config_repo(self.config_objects.clone())
            .with_user_repo(self.users.clone())
            .with_token_repo(self.tokens.clone())
            .with_settings_repo(self.settings.clone())
            .with_change_repo(self.changes.clone())
            .with_stats_repo(self.stats.clone())
            .with_core(self.core.clone())
    }
}

impl Default for MockRepositories {
    fn default() -> Self {
        Self::new()
    }
}
