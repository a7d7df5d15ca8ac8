//! Api Service - the operations behind the action tables
//!
//! Handlers decode the request, call one method here and encode the result
//! into an envelope. Token cache rebuilds are triggered by the router, not
//! by the token operations themselves.

use std::collections::BTreeMap;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::RngCore;
use sbpanel_core::{
    ApiToken, ChangeQuery, ChangeRecord, Client, ClientRegistry, ConfigKind, ConfigObject,
    Inbound, NewApiToken, RegistryError, StatsQuery, User,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::link_convert::{self, LinkError};
use crate::api::Section;
use crate::auth::{hash_password, verify_password};
use crate::server::{GatewayDependencies, SessionStore, TokenCache};

/// Window in which a tag with traffic counts as online
const ONLINE_WINDOW_SECS: i64 = 60;

const DEFAULT_LOG_LINES: usize = 10;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    BadRequest(String),

    #[error("wrong username or password")]
    WrongCredentials,

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassRequest {
    pub id: i64,
    pub old_pass: String,
    pub new_username: String,
    pub new_pass: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub object: String,
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct LinkConvertRequest {
    pub link: String,
}

#[derive(Debug, Deserialize)]
pub struct AddTokenRequest {
    #[serde(default)]
    pub desc: String,
    /// Days until expiry, 0 = never
    #[serde(default)]
    pub expiry: i64,
}

#[derive(Debug, Deserialize)]
pub struct DeleteTokenRequest {
    pub id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub tag: String,
    /// Hours of history
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsParams {
    pub c: Option<usize>,
    pub l: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangesParams {
    pub a: Option<String>,
    pub k: Option<String>,
    pub c: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KeypairsParams {
    #[serde(default)]
    pub k: String,
    #[serde(default)]
    pub o: String,
}

/// Payload of `save` for the clients object
#[derive(Debug, Deserialize)]
struct ClientSave {
    inbound: i64,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ClientDelete {
    inbound: i64,
    id: String,
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> ServiceResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ServiceError::BadRequest(format!("invalid {}: {}", what, e)))
}

fn id_of(data: &Value) -> Option<i64> {
    data.as_i64().or_else(|| data.get("id").and_then(Value::as_i64))
}

fn tag_of(data: &Value) -> Option<String> {
    data.as_str()
        .or_else(|| data.get("tag").and_then(Value::as_str))
        .filter(|t| !t.trim().is_empty())
        .map(String::from)
}

fn settings_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct ApiService {
    deps: GatewayDependencies,
    registry: Arc<ClientRegistry>,
    sessions: Arc<SessionStore>,
    tokens: Arc<TokenCache>,
    restart: CancellationToken,
    restart_delay: Duration,
    started_at: Instant,
}

impl ApiService {
    pub fn new(
        deps: GatewayDependencies,
        registry: Arc<ClientRegistry>,
        sessions: Arc<SessionStore>,
        tokens: Arc<TokenCache>,
        restart: CancellationToken,
        restart_delay: Duration,
    ) -> Self {
        Self {
            deps,
            registry,
            sessions,
            tokens,
            restart,
            restart_delay,
            started_at: Instant::now(),
        }
    }

    async fn record_change(&self, actor: &User, key: &str, action: &str, obj: Value) {
        let change = ChangeRecord::new(&actor.username, key, action, obj);
        if let Err(e) = self.deps.change_repo.record(&change).await {
            warn!("[Api] Failed to record change {} {}: {}", key, action, e);
        }
    }

    // ------------------------------------------------------------------------
    // Mutating table
    // ------------------------------------------------------------------------

    /// Verify credentials and open a session, returning its credential
    pub async fn login(&self, req: LoginRequest) -> ServiceResult<String> {
        let user = self
            .deps
            .user_repo
            .get_by_username(req.username.trim())
            .await?
            .filter(|u| verify_password(&u.password_hash, &req.password))
            .ok_or_else(|| {
                warn!("[Auth] Failed login for '{}'", req.username);
                ServiceError::WrongCredentials
            })?;

        let now = chrono::Utc::now().timestamp();
        if let Err(e) = self.deps.user_repo.record_login(user.id, now).await {
            warn!("[Auth] Failed to record login for '{}': {}", user.username, e);
        }

        info!("[Auth] User '{}' logged in", user.username);
        Ok(self.sessions.create(user))
    }

    pub fn logout(&self, credential: Option<&str>) {
        if let Some(credential) = credential {
            if self.sessions.remove(credential) {
                info!("[Auth] Session closed");
            }
        }
    }

    pub async fn change_pass(&self, caller: &User, req: ChangePassRequest) -> ServiceResult<()> {
        if req.new_username.trim().is_empty() || req.new_pass.is_empty() {
            return Err(ServiceError::BadRequest(
                "username and password must not be empty".into(),
            ));
        }

        let user = self
            .deps
            .user_repo
            .get(req.id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {} not found", req.id)))?;
        if !verify_password(&user.password_hash, &req.old_pass) {
            return Err(ServiceError::WrongCredentials);
        }

        let hash = hash_password(&req.new_pass)?;
        self.deps
            .user_repo
            .update_credentials(user.id, req.new_username.trim(), &hash)
            .await?;

        let closed = self.sessions.remove_user(user.id);
        // Tokens carry a copy of the user, refresh them with the new name
        self.tokens
            .rebuild(self.deps.token_repo.as_ref(), self.deps.user_repo.as_ref())
            .await?;

        self.record_change(caller, "users", "edit", json!({ "id": user.id })).await;
        info!(
            "[Auth] Credentials of user {} changed, {} sessions closed",
            user.id, closed
        );
        Ok(())
    }

    /// Apply a configuration mutation and return the fresh view of the object
    pub async fn save(&self, actor: &User, req: SaveRequest) -> ServiceResult<Value> {
        let SaveRequest {
            object,
            action,
            data,
        } = req;

        if object == "settings" {
            if action != "set" && action != "edit" {
                return Err(ServiceError::BadRequest(format!(
                    "unknown settings action: {}",
                    action
                )));
            }
            let map: Map<String, Value> = decode(data.clone(), "settings")?;
            let values: BTreeMap<String, String> = map
                .iter()
                .map(|(k, v)| (k.clone(), settings_value(v)))
                .collect();
            self.deps.settings_repo.set_many(&values).await?;
            self.record_change(actor, &object, &action, data).await;
            return Ok(json!({ "settings": self.settings().await? }));
        }

        let unknown = || ServiceError::BadRequest(format!("unknown object: {}", object));
        let section = Section::from_str(&object).map_err(|_| unknown())?;

        let logged = data.clone();
        match section {
            Section::Inbounds => self.save_inbound(&action, data).await?,
            Section::Clients => self.save_client(&action, data).await?,
            Section::Outbounds | Section::Endpoints | Section::Tls => {
                let kind = ConfigKind::from_str(section.as_str())
                    .map_err(ServiceError::BadRequest)?;
                self.save_config_object(kind, &action, data).await?
            }
            Section::Config => return Err(unknown()),
        }

        self.record_change(actor, &object, &action, logged).await;
        info!("[Api] Saved {} ({})", object, action);
        self.partial(section).await
    }

    async fn save_inbound(&self, action: &str, data: Value) -> ServiceResult<()> {
        match action {
            "new" => {
                let inbound: Inbound = decode(data, "inbound")?;
                self.registry.create_inbound(inbound).await?;
            }
            "edit" => {
                let inbound: Inbound = decode(data, "inbound")?;
                self.registry.replace_inbound(inbound).await?;
            }
            "del" => {
                let id = id_of(&data)
                    .ok_or_else(|| ServiceError::BadRequest("inbound id required".into()))?;
                self.registry.delete_inbound(id).await?;
            }
            other => {
                return Err(ServiceError::BadRequest(format!(
                    "unknown inbound action: {}",
                    other
                )))
            }
        }
        Ok(())
    }

    async fn save_client(&self, action: &str, data: Value) -> ServiceResult<()> {
        match action {
            "new" => {
                let save: ClientSave = decode(data, "client")?;
                self.registry.add_client(save.inbound, save.client).await?;
            }
            "edit" => {
                let save: ClientSave = decode(data, "client")?;
                self.registry.update_client(save.inbound, save.client).await?;
            }
            "del" => {
                let del: ClientDelete = decode(data, "client")?;
                self.registry.delete_client(del.inbound, &del.id).await?;
            }
            other => {
                return Err(ServiceError::BadRequest(format!(
                    "unknown client action: {}",
                    other
                )))
            }
        }
        Ok(())
    }

    async fn save_config_object(
        &self,
        kind: ConfigKind,
        action: &str,
        data: Value,
    ) -> ServiceResult<()> {
        let tag = tag_of(&data).ok_or_else(|| {
            ServiceError::BadRequest(format!("{} object needs a tag", kind.as_str()))
        })?;

        match action {
            "new" | "edit" => {
                if !data.is_object() {
                    return Err(ServiceError::BadRequest(format!(
                        "{} object must be a JSON object",
                        kind.as_str()
                    )));
                }
                let object = ConfigObject {
                    kind,
                    tag,
                    body: data,
                };
                self.deps.config_repo.upsert(&object).await?;
            }
            "del" => {
                if !self.deps.config_repo.delete(kind, &tag).await? {
                    return Err(ServiceError::NotFound(format!(
                        "{} '{}' not found",
                        kind.as_str(),
                        tag
                    )));
                }
            }
            other => {
                return Err(ServiceError::BadRequest(format!(
                    "unknown {} action: {}",
                    kind.as_str(),
                    other
                )))
            }
        }
        Ok(())
    }

    /// Schedule a gateway restart after the response went out
    pub fn restart_app(&self) {
        let token = self.restart.clone();
        let delay = self.restart_delay;
        info!("[Api] Gateway restart scheduled in {:?}", delay);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            token.cancel();
        });
    }

    pub async fn restart_core(&self) -> ServiceResult<()> {
        let config = self.render_config().await?;
        self.deps.core.restart(&config).await?;
        info!("[Api] Proxy core restarted");
        Ok(())
    }

    pub fn link_convert(&self, req: LinkConvertRequest) -> ServiceResult<Value> {
        Ok(link_convert::convert(&req.link)?)
    }

    /// Replace the database with an uploaded SQLite file
    pub async fn import_db(&self, bytes: &[u8]) -> ServiceResult<()> {
        let database = self
            .deps
            .database
            .as_ref()
            .ok_or_else(|| ServiceError::BadRequest("database import not available".into()))?;
        if bytes.is_empty() {
            return Err(ServiceError::BadRequest("empty database file".into()));
        }

        let mut file = tempfile::NamedTempFile::new().map_err(anyhow::Error::from)?;
        file.write_all(bytes).map_err(anyhow::Error::from)?;
        file.flush().map_err(anyhow::Error::from)?;

        database.lock().await.restore_from(file.path())?;

        self.registry.load().await?;
        self.tokens
            .rebuild(self.deps.token_repo.as_ref(), self.deps.user_repo.as_ref())
            .await?;
        info!("[Api] Database imported ({} bytes)", bytes.len());
        Ok(())
    }

    pub async fn add_token(&self, owner: &User, req: AddTokenRequest) -> ServiceResult<ApiToken> {
        if req.expiry < 0 {
            return Err(ServiceError::BadRequest("expiry must not be negative".into()));
        }

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let expiry = match req.expiry {
            0 => 0,
            days => days
                .checked_mul(86_400)
                .and_then(|secs| chrono::Utc::now().timestamp().checked_add(secs))
                .ok_or_else(|| ServiceError::BadRequest("expiry too large".into()))?,
        };

        let token = self
            .deps
            .token_repo
            .create(&NewApiToken {
                token: hex::encode(bytes),
                desc: req.desc,
                expiry,
                user_id: owner.id,
            })
            .await?;

        info!("[Api] Token {} created for '{}'", token.id, owner.username);
        Ok(token)
    }

    pub async fn delete_token(&self, owner: &User, req: DeleteTokenRequest) -> ServiceResult<()> {
        let owned = self
            .deps
            .token_repo
            .list_for_user(owner.id)
            .await?
            .into_iter()
            .any(|t| t.id == req.id);
        if !owned || !self.deps.token_repo.delete(req.id).await? {
            return Err(ServiceError::NotFound(format!("token {} not found", req.id)));
        }

        info!("[Api] Token {} deleted by '{}'", req.id, owner.username);
        Ok(())
    }

    /// Rebuild the token cache from the token repository
    pub async fn rebuild_tokens(&self) -> ServiceResult<usize> {
        Ok(self
            .tokens
            .rebuild(self.deps.token_repo.as_ref(), self.deps.user_repo.as_ref())
            .await?)
    }

    // ------------------------------------------------------------------------
    // Retrieving table
    // ------------------------------------------------------------------------

    /// Every section plus online tags
    pub async fn load(&self) -> ServiceResult<Value> {
        let mut all = Map::new();
        for section in Section::ALL {
            all.insert(section.as_str().to_string(), self.section(section).await?);
        }
        all.insert("onlines".to_string(), self.onlines().await?);
        Ok(Value::Object(all))
    }

    /// `{<section>: ...}` for one section of the batch group
    pub async fn partial(&self, section: Section) -> ServiceResult<Value> {
        let mut one = Map::new();
        one.insert(section.as_str().to_string(), self.section(section).await?);
        Ok(Value::Object(one))
    }

    async fn section(&self, section: Section) -> ServiceResult<Value> {
        let value = match section {
            Section::Inbounds => serde_json::to_value(self.registry.snapshot().await)
                .map_err(anyhow::Error::from)?,
            Section::Clients => Value::Array(self.client_view().await),
            Section::Outbounds => Value::Array(self.config_objects(ConfigKind::Outbounds).await?),
            Section::Endpoints => Value::Array(self.config_objects(ConfigKind::Endpoints).await?),
            Section::Tls => Value::Array(self.config_objects(ConfigKind::Tls).await?),
            Section::Config => self.render_config().await?,
        };
        Ok(value)
    }

    async fn config_objects(&self, kind: ConfigKind) -> ServiceResult<Vec<Value>> {
        Ok(self
            .deps
            .config_repo
            .list(kind)
            .await?
            .into_iter()
            .map(|object| {
                let mut body = object.body;
                if let Some(map) = body.as_object_mut() {
                    map.insert("tag".to_string(), Value::String(object.tag));
                }
                body
            })
            .collect())
    }

    /// Clients flattened with their owning inbound
    async fn client_view(&self) -> Vec<Value> {
        let mut view = Vec::new();
        for inbound in self.registry.snapshot().await {
            for client in &inbound.settings.clients {
                let mut entry = match serde_json::to_value(client) {
                    Ok(Value::Object(map)) => map,
                    _ => continue,
                };
                entry.insert("inbound".to_string(), json!(inbound.id));
                entry.insert("inboundTag".to_string(), json!(inbound.tag));
                view.push(Value::Object(entry));
            }
        }
        view
    }

    /// Proxy core configuration rendered from the current state
    pub async fn render_config(&self) -> ServiceResult<Value> {
        let inbounds: Vec<Value> = self
            .registry
            .snapshot()
            .await
            .iter()
            .map(render_inbound)
            .collect();

        let mut outbounds = self.config_objects(ConfigKind::Outbounds).await?;
        if outbounds.is_empty() {
            outbounds.push(json!({ "type": "direct", "tag": "direct" }));
        }
        let endpoints = self.config_objects(ConfigKind::Endpoints).await?;

        let mut config = json!({
            "log": { "level": "info" },
            "inbounds": inbounds,
            "outbounds": outbounds,
        });
        if !endpoints.is_empty() {
            config["endpoints"] = Value::Array(endpoints);
        }
        Ok(config)
    }

    pub async fn users(&self) -> ServiceResult<Value> {
        let users: Vec<Value> = self
            .deps
            .user_repo
            .list()
            .await?
            .into_iter()
            .map(|u| json!({ "id": u.id, "username": u.username, "lastLogin": u.last_login }))
            .collect();
        Ok(Value::Array(users))
    }

    pub async fn settings(&self) -> ServiceResult<Value> {
        let all = self.deps.settings_repo.all().await?;
        Ok(serde_json::to_value(all).map_err(anyhow::Error::from)?)
    }

    pub async fn stats(&self, params: StatsParams) -> ServiceResult<Value> {
        let query = StatsQuery {
            resource: params.resource,
            tag: params.tag,
            hours: params.limit.unwrap_or(1),
        };
        let rows = self.deps.stats_repo.list(&query).await?;
        Ok(serde_json::to_value(rows).map_err(anyhow::Error::from)?)
    }

    pub async fn status(&self) -> ServiceResult<Value> {
        let inbounds = self.registry.snapshot().await;
        let clients: usize = inbounds.iter().map(|i| i.settings.clients.len()).sum();
        let last_change = self.deps.change_repo.last_change().await?;

        Ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "uptime": self.started_at.elapsed().as_secs(),
            "inbounds": inbounds.len(),
            "clients": clients,
            "sessions": self.sessions.len(),
            "tokens": self.tokens.len(),
            "core": self.deps.core.status().await,
            "lastChange": last_change,
        }))
    }

    /// Tags that moved traffic within the last minute
    pub async fn onlines(&self) -> ServiceResult<Value> {
        let mut onlines = Map::new();
        let running = self.deps.core.status().await.running;
        let since = chrono::Utc::now().timestamp() - ONLINE_WINDOW_SECS;

        for resource in ["inbound", "user", "outbound"] {
            let tags = if running {
                self.deps.stats_repo.active_tags(resource, since).await?
            } else {
                Vec::new()
            };
            onlines.insert(resource.to_string(), json!(tags));
        }
        Ok(Value::Object(onlines))
    }

    pub fn logs(&self, params: LogsParams) -> ServiceResult<Value> {
        let level = match params.l.as_deref().filter(|l| !l.is_empty()) {
            Some(l) => Some(
                tracing::Level::from_str(l)
                    .map_err(|_| ServiceError::BadRequest(format!("unknown log level: {}", l)))?,
            ),
            None => None,
        };
        let count = params.c.unwrap_or(DEFAULT_LOG_LINES);

        let lines = self
            .deps
            .log_buffer
            .as_ref()
            .map(|logs| logs.recent_lines(count, level))
            .unwrap_or_default();
        Ok(json!(lines))
    }

    pub async fn changes(&self, params: ChangesParams) -> ServiceResult<Value> {
        let query = ChangeQuery {
            actor: params.a.filter(|a| !a.is_empty()),
            key: params.k.filter(|k| !k.is_empty()),
            limit: params.c.unwrap_or(0),
        };
        let records = self.deps.change_repo.list(&query).await?;
        Ok(serde_json::to_value(records).map_err(anyhow::Error::from)?)
    }

    pub async fn keypairs(&self, params: KeypairsParams) -> ServiceResult<Value> {
        let lines = self.deps.core.keypairs(&params.k, &params.o).await?;
        Ok(json!(lines))
    }

    /// Raw bytes of a consistent database copy
    pub async fn export_db(&self) -> ServiceResult<Vec<u8>> {
        let database = self
            .deps
            .database
            .as_ref()
            .ok_or_else(|| ServiceError::BadRequest("database export not available".into()))?;

        let dir = tempfile::tempdir().map_err(anyhow::Error::from)?;
        let path = dir.path().join(sbpanel_storage::DATABASE_FILE);
        database.lock().await.export_to(&path)?;

        let bytes = tokio::fs::read(&path).await.map_err(anyhow::Error::from)?;
        Ok(bytes)
    }

    pub async fn tokens(&self, owner: &User) -> ServiceResult<Value> {
        let tokens = self.deps.token_repo.list_for_user(owner.id).await?;
        Ok(serde_json::to_value(tokens).map_err(anyhow::Error::from)?)
    }
}

/// Inbound in the proxy core's format; disabled clients are left out
fn render_inbound(inbound: &Inbound) -> Value {
    let users: Vec<Value> = inbound
        .settings
        .clients
        .iter()
        .filter(|c| c.enable)
        .map(|c| {
            let mut user = Map::new();
            user.insert("name".to_string(), json!(c.id));
            if let Some(uuid) = &c.uuid {
                user.insert("uuid".to_string(), json!(uuid));
            }
            if let Some(password) = &c.password {
                user.insert("password".to_string(), json!(password));
            }
            if let Some(flow) = &c.flow {
                user.insert("flow".to_string(), json!(flow));
            }
            Value::Object(user)
        })
        .collect();

    let mut rendered = inbound.settings.extra.clone();
    rendered.insert("type".to_string(), json!(inbound.protocol.as_str()));
    rendered.insert("tag".to_string(), json!(inbound.tag));
    rendered.insert("listen".to_string(), json!(inbound.listen));
    rendered.insert("listen_port".to_string(), json!(inbound.listen_port));
    if !users.is_empty() {
        rendered.insert("users".to_string(), Value::Array(users));
    }
    Value::Object(rendered)
}
