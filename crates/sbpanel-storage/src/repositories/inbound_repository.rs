//! SQLite implementation of InboundRepository.
//!
//! The client roster lives inside the `settings` JSON column so that
//! protocol-specific keys round-trip untouched.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use sbpanel_core::{Client, Inbound, InboundRepository, InboundSettings, Protocol};
use tokio::sync::Mutex;

use crate::Database;

type InboundRow = (i64, String, String, String, u16, String);

/// SQLite-backed implementation of InboundRepository.
pub struct SqliteInboundRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteInboundRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<InboundRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn decode((id, tag, protocol, listen, listen_port, settings): InboundRow) -> Result<Inbound> {
        let protocol = protocol
            .parse::<Protocol>()
            .map_err(|e: String| anyhow!("inbound {}: {}", id, e))?;
        let settings: InboundSettings = serde_json::from_str(&settings)
            .with_context(|| format!("inbound {} has malformed settings", id))?;

        Ok(Inbound {
            id,
            tag,
            protocol,
            listen,
            listen_port,
            settings,
        })
    }
}

#[async_trait]
impl InboundRepository for SqliteInboundRepository {
    async fn list(&self) -> Result<Vec<Inbound>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(
            "SELECT id, tag, protocol, listen, listen_port, settings FROM inbounds ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], Self::read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(Self::decode).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Inbound>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let row = conn
            .query_row(
                "SELECT id, tag, protocol, listen, listen_port, settings FROM inbounds WHERE id = ?",
                params![id],
                Self::read_row,
            )
            .optional()?;

        row.map(Self::decode).transpose()
    }

    async fn create(&self, inbound: &Inbound) -> Result<i64> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let settings = serde_json::to_string(&inbound.settings)?;

        conn.execute(
            "INSERT INTO inbounds (tag, protocol, listen, listen_port, settings)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                inbound.tag,
                inbound.protocol.as_str(),
                inbound.listen,
                inbound.listen_port,
                settings,
            ],
        )
        .with_context(|| format!("Failed to insert inbound '{}'", inbound.tag))?;

        Ok(conn.last_insert_rowid())
    }

    async fn update(&self, inbound: &Inbound) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let settings = serde_json::to_string(&inbound.settings)?;

        let changed = conn.execute(
            "UPDATE inbounds SET tag = ?2, protocol = ?3, listen = ?4, listen_port = ?5, settings = ?6
             WHERE id = ?1",
            params![
                inbound.id,
                inbound.tag,
                inbound.protocol.as_str(),
                inbound.listen,
                inbound.listen_port,
                settings,
            ],
        )?;

        if changed == 0 {
            return Err(anyhow!("inbound {} does not exist", inbound.id));
        }
        Ok(())
    }

    async fn update_clients(&self, id: i64, clients: &[Client]) -> Result<()> {
        let db = self.db.lock().await;

        db.transaction(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT settings FROM inbounds WHERE id = ?",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let raw = raw.ok_or_else(|| anyhow!("inbound {} does not exist", id))?;

            let mut settings: InboundSettings = serde_json::from_str(&raw)
                .with_context(|| format!("inbound {} has malformed settings", id))?;
            settings.clients = clients.to_vec();

            conn.execute(
                "UPDATE inbounds SET settings = ?2 WHERE id = ?1",
                params![id, serde_json::to_string(&settings)?],
            )?;
            Ok(())
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute("DELETE FROM inbounds WHERE id = ?", params![id])?;
        Ok(())
    }
}
