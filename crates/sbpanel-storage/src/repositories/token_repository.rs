//! SQLite implementation of TokenRepository.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Row};
use sbpanel_core::{ApiToken, NewApiToken, TokenRepository};
use tokio::sync::Mutex;

use crate::Database;

pub struct SqliteTokenRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteTokenRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    fn row_to_token(row: &Row<'_>) -> rusqlite::Result<ApiToken> {
        Ok(ApiToken {
            id: row.get(0)?,
            token: row.get(1)?,
            desc: row.get(2)?,
            expiry: row.get(3)?,
            user_id: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

#[async_trait]
impl TokenRepository for SqliteTokenRepository {
    async fn list(&self) -> Result<Vec<ApiToken>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(
            "SELECT id, token, description, expiry, user_id, created_at FROM tokens ORDER BY id",
        )?;
        let tokens = stmt
            .query_map([], Self::row_to_token)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tokens)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<ApiToken>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(
            "SELECT id, token, description, expiry, user_id, created_at FROM tokens
             WHERE user_id = ? ORDER BY id",
        )?;
        let tokens = stmt
            .query_map(params![user_id], Self::row_to_token)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tokens)
    }

    async fn create(&self, token: &NewApiToken) -> Result<ApiToken> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO tokens (token, description, expiry, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![token.token, token.desc, token.expiry, token.user_id, now],
        )
        .context("Failed to insert token")?;

        Ok(ApiToken {
            id: conn.last_insert_rowid(),
            token: token.token.clone(),
            desc: token.desc.clone(),
            expiry: token.expiry,
            user_id: token.user_id,
            created_at: now,
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let removed = db
            .connection()
            .execute("DELETE FROM tokens WHERE id = ?", params![id])?;
        Ok(removed > 0)
    }
}
