//! ApiToken entity - long-lived credential for programmatic access

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// API token owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiToken {
    pub id: i64,

    pub token: String,

    /// Free-form label
    #[serde(default)]
    pub desc: String,

    /// Expiry as unix seconds (0 = never)
    #[serde(default)]
    pub expiry: i64,

    pub user_id: i64,

    pub created_at: i64,
}

impl ApiToken {
    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        self.expiry != 0 && Utc::now().timestamp() >= self.expiry
    }
}

/// Token creation request
#[derive(Debug, Clone)]
pub struct NewApiToken {
    pub token: String,
    pub desc: String,
    pub expiry: i64,
    pub user_id: i64,
}
