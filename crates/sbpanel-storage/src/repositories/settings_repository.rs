//! SQLite implementation of SettingsRepository.
//!
//! Flat key-value store for panel-wide settings.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use sbpanel_core::SettingsRepository;
use tokio::sync::Mutex;

use crate::Database;

pub struct SqliteSettingsRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteSettingsRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn all(&self) -> Result<BTreeMap<String, String>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(rows)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let value = db
            .connection()
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn set_many(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let db = self.db.lock().await;

        db.transaction(|conn| {
            let mut stmt = conn.prepare(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            for (key, value) in values {
                stmt.execute(params![key, value])?;
            }
            Ok(())
        })
    }
}
