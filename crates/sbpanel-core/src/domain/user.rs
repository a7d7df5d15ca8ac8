//! User entity - an administrator of the panel

use serde::{Deserialize, Serialize};

/// Panel administrator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,

    pub username: String,

    /// Argon2 PHC string, never serialized to API callers
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Last successful login (unix seconds)
    #[serde(default)]
    pub last_login: Option<i64>,
}

impl User {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            password_hash: String::new(),
            last_login: None,
        }
    }
}
