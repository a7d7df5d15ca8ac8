//! SQLite implementation of ChangeRepository.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, types::Value as SqlValue};
use sbpanel_core::{ChangeQuery, ChangeRecord, ChangeRepository};
use tokio::sync::Mutex;

use crate::Database;

/// Applied when a query does not set a limit
const DEFAULT_LIMIT: usize = 100;

pub struct SqliteChangeRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteChangeRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChangeRepository for SqliteChangeRepository {
    async fn record(&self, change: &ChangeRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO changes (date_time, actor, key, action, obj) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                change.date_time,
                change.actor,
                change.key,
                change.action,
                serde_json::to_string(&change.obj)?
            ],
        )?;
        Ok(())
    }

    async fn list(&self, query: &ChangeQuery) -> Result<Vec<ChangeRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut sql =
            String::from("SELECT id, date_time, actor, key, action, obj FROM changes WHERE 1 = 1");
        let mut args: Vec<SqlValue> = Vec::new();
        if let Some(actor) = &query.actor {
            sql.push_str(" AND actor = ?");
            args.push(SqlValue::Text(actor.clone()));
        }
        if let Some(key) = &query.key {
            sql.push_str(" AND key = ?");
            args.push(SqlValue::Text(key.clone()));
        }
        sql.push_str(" ORDER BY id DESC LIMIT ?");
        let limit = if query.limit == 0 { DEFAULT_LIMIT } else { query.limit };
        args.push(SqlValue::Integer(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, date_time, actor, key, action, obj)| {
                Ok(ChangeRecord {
                    id,
                    date_time,
                    actor,
                    key,
                    action,
                    obj: serde_json::from_str(&obj)?,
                })
            })
            .collect()
    }

    async fn last_change(&self) -> Result<Option<i64>> {
        let db = self.db.lock().await;
        let last = db
            .connection()
            .query_row("SELECT MAX(date_time) FROM changes", [], |row| row.get(0))?;
        Ok(last)
    }
}
