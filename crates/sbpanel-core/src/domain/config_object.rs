//! Tagged configuration objects kept beside inbounds (outbounds, endpoints, tls)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Kind of stored configuration object
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    Outbounds,
    Endpoints,
    Tls,
}

impl ConfigKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKind::Outbounds => "outbounds",
            ConfigKind::Endpoints => "endpoints",
            ConfigKind::Tls => "tls",
        }
    }
}

impl FromStr for ConfigKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outbounds" => Ok(ConfigKind::Outbounds),
            "endpoints" => Ok(ConfigKind::Endpoints),
            "tls" => Ok(ConfigKind::Tls),
            other => Err(format!("unknown config kind: {}", other)),
        }
    }
}

/// A stored object, unique per (kind, tag)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigObject {
    pub kind: ConfigKind,
    pub tag: String,
    pub body: Value,
}
