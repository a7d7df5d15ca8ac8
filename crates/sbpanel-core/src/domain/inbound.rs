//! Inbound entity - a listening endpoint of the proxy core and its client roster

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::RegistryError;

/// Proxy protocol spoken by an inbound
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Vless,
    Vmess,
    Trojan,
    Shadowsocks,
    Hysteria,
    Hysteria2,
    Tuic,
    Naive,
    Socks,
    Http,
    Mixed,
    Direct,
}

/// Credential material a protocol requires from each client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Uuid,
    Password,
    None,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Vless => "vless",
            Protocol::Vmess => "vmess",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "shadowsocks",
            Protocol::Hysteria => "hysteria",
            Protocol::Hysteria2 => "hysteria2",
            Protocol::Tuic => "tuic",
            Protocol::Naive => "naive",
            Protocol::Socks => "socks",
            Protocol::Http => "http",
            Protocol::Mixed => "mixed",
            Protocol::Direct => "direct",
        }
    }

    /// Which credential field identifies a client to the proxy core
    pub fn credential(&self) -> CredentialKind {
        match self {
            Protocol::Vless | Protocol::Vmess | Protocol::Tuic => CredentialKind::Uuid,
            Protocol::Trojan | Protocol::Shadowsocks | Protocol::Hysteria2 | Protocol::Naive => {
                CredentialKind::Password
            }
            Protocol::Hysteria
            | Protocol::Socks
            | Protocol::Http
            | Protocol::Mixed
            | Protocol::Direct => CredentialKind::None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| format!("unsupported protocol: {}", s))
    }
}

/// Traffic and time limits attached to a client
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientLimits {
    /// Total traffic allowance in bytes (0 = unlimited)
    #[serde(default)]
    pub volume: u64,
    /// Expiry as unix seconds (0 = never)
    #[serde(default)]
    pub expiry: i64,
}

impl ClientLimits {
    pub fn is_unlimited(&self) -> bool {
        self.volume == 0 && self.expiry == 0
    }
}

fn default_enable() -> bool {
    true
}

/// A credential entry allowed to use an inbound
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    /// Identifier, unique within the owning inbound
    pub id: String,

    #[serde(default = "default_enable")]
    pub enable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,

    #[serde(default, skip_serializing_if = "ClientLimits::is_unlimited")]
    pub limits: ClientLimits,

    /// Protocol-specific keys the panel passes through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Client {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enable: true,
            uuid: None,
            password: None,
            flow: None,
            limits: ClientLimits::default(),
            extra: Map::new(),
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_limits(mut self, volume: u64, expiry: i64) -> Self {
        self.limits = ClientLimits { volume, expiry };
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enable = false;
        self
    }

    /// Check the client carries the credential material `protocol` needs
    pub fn validate_for(&self, protocol: Protocol) -> Result<(), RegistryError> {
        if self.id.trim().is_empty() {
            return Err(RegistryError::Validation("client id must not be empty".into()));
        }

        match protocol.credential() {
            CredentialKind::Uuid => {
                let uuid = self.uuid.as_deref().unwrap_or_default();
                if Uuid::parse_str(uuid).is_err() {
                    return Err(RegistryError::Validation(format!(
                        "client '{}' needs a valid uuid for {}",
                        self.id, protocol
                    )));
                }
            }
            CredentialKind::Password => {
                if self.password.as_deref().map_or(true, str::is_empty) {
                    return Err(RegistryError::Validation(format!(
                        "client '{}' needs a password for {}",
                        self.id, protocol
                    )));
                }
            }
            CredentialKind::None => {}
        }

        Ok(())
    }

    /// Overwrite the mutable fields from `other`, keeping the identifier
    pub fn apply_update(&mut self, other: &Client) {
        self.enable = other.enable;
        self.uuid = other.uuid.clone();
        self.password = other.password.clone();
        self.flow = other.flow.clone();
        self.limits = other.limits.clone();
        self.extra = other.extra.clone();
    }
}

/// Inbound settings: the ordered client list plus free-form protocol keys
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InboundSettings {
    #[serde(default)]
    pub clients: Vec<Client>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InboundSettings {
    /// Position of the client with `client_id`
    pub fn position(&self, client_id: &str) -> Option<usize> {
        self.clients.iter().position(|c| c.id == client_id)
    }
}

fn default_listen() -> String {
    "::".to_string()
}

/// Inbound represents a proxy listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Inbound {
    /// Unique identifier (assigned by storage, 0 before creation)
    #[serde(default)]
    pub id: i64,

    /// Unique tag used by the proxy core
    pub tag: String,

    pub protocol: Protocol,

    #[serde(default = "default_listen")]
    pub listen: String,

    pub listen_port: u16,

    #[serde(default)]
    pub settings: InboundSettings,
}

impl Inbound {
    /// Create a new inbound with no clients
    pub fn new(tag: impl Into<String>, protocol: Protocol, listen_port: u16) -> Self {
        Self {
            id: 0,
            tag: tag.into(),
            protocol,
            listen: default_listen(),
            listen_port,
            settings: InboundSettings::default(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.settings.clients.push(client);
        self
    }

    pub fn client(&self, client_id: &str) -> Option<&Client> {
        self.settings.clients.iter().find(|c| c.id == client_id)
    }

    pub fn client_ids(&self) -> Vec<&str> {
        self.settings.clients.iter().map(|c| c.id.as_str()).collect()
    }

    /// Validate every client and the uniqueness of their identifiers
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.tag.trim().is_empty() {
            return Err(RegistryError::Validation("inbound tag must not be empty".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for client in &self.settings.clients {
            client.validate_for(self.protocol)?;
            if !seen.insert(client.id.as_str()) {
                return Err(RegistryError::ClientConflict {
                    inbound_id: self.id,
                    client_id: client.id.clone(),
                });
            }
        }
        Ok(())
    }
}
