//! SQLite implementation of ConfigObjectRepository.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::params;
use sbpanel_core::{ConfigKind, ConfigObject, ConfigObjectRepository};
use tokio::sync::Mutex;

use crate::Database;

/// Outbounds, endpoints and tls profiles stored as JSON bodies
pub struct SqliteConfigObjectRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteConfigObjectRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConfigObjectRepository for SqliteConfigObjectRepository {
    async fn list(&self, kind: ConfigKind) -> Result<Vec<ConfigObject>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt =
            conn.prepare("SELECT tag, body FROM config_objects WHERE kind = ? ORDER BY tag")?;
        let rows = stmt
            .query_map(params![kind.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(tag, body)| {
                Ok(ConfigObject {
                    kind,
                    tag,
                    body: serde_json::from_str(&body)?,
                })
            })
            .collect()
    }

    async fn upsert(&self, object: &ConfigObject) -> Result<()> {
        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO config_objects (kind, tag, body) VALUES (?1, ?2, ?3)
             ON CONFLICT(kind, tag) DO UPDATE SET body = excluded.body",
            params![
                object.kind.as_str(),
                object.tag,
                serde_json::to_string(&object.body)?
            ],
        )?;
        Ok(())
    }

    async fn delete(&self, kind: ConfigKind, tag: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let removed = db.connection().execute(
            "DELETE FROM config_objects WHERE kind = ? AND tag = ?",
            params![kind.as_str(), tag],
        )?;
        Ok(removed > 0)
    }
}
