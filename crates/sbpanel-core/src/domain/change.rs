//! Change records - audit trail of configuration mutations

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single recorded mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeRecord {
    #[serde(default)]
    pub id: i64,
    /// Unix seconds
    pub date_time: i64,
    /// Username that performed the change
    pub actor: String,
    /// Object kind (inbounds, clients, settings, ...)
    pub key: String,
    /// new / edit / del / set
    pub action: String,
    pub obj: Value,
}

impl ChangeRecord {
    pub fn new(
        actor: impl Into<String>,
        key: impl Into<String>,
        action: impl Into<String>,
        obj: Value,
    ) -> Self {
        Self {
            id: 0,
            date_time: chrono::Utc::now().timestamp(),
            actor: actor.into(),
            key: key.into(),
            action: action.into(),
            obj,
        }
    }
}

/// Filter for listing change records
#[derive(Debug, Clone, Default)]
pub struct ChangeQuery {
    pub actor: Option<String>,
    pub key: Option<String>,
    pub limit: usize,
}
