//! SQLite implementation of UserRepository.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use sbpanel_core::{User, UserRepository};
use tokio::sync::Mutex;

use crate::Database;

pub struct SqliteUserRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteUserRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            last_login: row.get(3)?,
        })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn list(&self) -> Result<Vec<User>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn
            .prepare("SELECT id, username, password_hash, last_login FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    async fn get(&self, id: i64) -> Result<Option<User>> {
        let db = self.db.lock().await;
        let user = db
            .connection()
            .query_row(
                "SELECT id, username, password_hash, last_login FROM users WHERE id = ?",
                params![id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let db = self.db.lock().await;
        let user = db
            .connection()
            .query_row(
                "SELECT id, username, password_hash, last_login FROM users WHERE username = ?",
                params![username],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    async fn create(&self, username: &str, password_hash: &str) -> Result<User> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, password_hash],
        )?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            last_login: None,
        })
    }

    async fn update_credentials(
        &self,
        id: i64,
        username: &str,
        password_hash: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let changed = db.connection().execute(
            "UPDATE users SET username = ?2, password_hash = ?3 WHERE id = ?1",
            params![id, username, password_hash],
        )?;
        if changed == 0 {
            return Err(anyhow!("user {} does not exist", id));
        }
        Ok(())
    }

    async fn record_login(&self, id: i64, at: i64) -> Result<()> {
        let db = self.db.lock().await;
        db.connection().execute(
            "UPDATE users SET last_login = ?2 WHERE id = ?1",
            params![id, at],
        )?;
        Ok(())
    }
}
