//! sbpanel Storage Layer
//!
//! SQLite persistence for inbounds, configuration objects, users, API tokens,
//! settings, change records and traffic stats.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    Gateway                           │
//! ├──────────────────────────────────────────────────────┤
//! │               Repository Traits                      │
//! │     (InboundRepository, TokenRepository, etc.)       │
//! ├──────────────────────────────────────────────────────┤
//! │            SQLite Implementations                    │
//! │  (SqliteInboundRepository, SqliteTokenRepository)    │
//! ├──────────────────────────────────────────────────────┤
//! │                   Database                           │
//! │          (SQLite, migrations, backup)                │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use sbpanel_storage::{Database, SqliteInboundRepository};
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! let db = Arc::new(Mutex::new(Database::open(&path)?));
//! let inbounds = SqliteInboundRepository::new(db.clone());
//! ```

mod database;
mod repositories;

pub use database::Database;
pub use repositories::*;

/// Default database file name.
pub const DATABASE_FILE: &str = "sbpanel.db";

/// Get the default data directory for the current platform.
pub fn default_data_dir() -> Option<std::path::PathBuf> {
    dirs::data_local_dir().map(|p| p.join(sbpanel_core::APP_NAME))
}
