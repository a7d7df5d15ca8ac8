//! SQLite implementation of StatsRepository.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::params;
use sbpanel_core::{StatsQuery, StatsRecord, StatsRepository};
use tokio::sync::Mutex;

use crate::Database;

pub struct SqliteStatsRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteStatsRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StatsRepository for SqliteStatsRepository {
    async fn record_many(&self, records: &[StatsRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let db = self.db.lock().await;
        db.transaction(|conn| {
            let mut stmt = conn.prepare(
                "INSERT INTO stats (date_time, resource, tag, direction, traffic)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.date_time,
                    record.resource,
                    record.tag,
                    record.direction,
                    record.traffic
                ])?;
            }
            Ok(())
        })
    }

    async fn list(&self, query: &StatsQuery) -> Result<Vec<StatsRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let since = chrono::Utc::now().timestamp() - query.hours.max(1) * 3600;

        let mut stmt = conn.prepare(
            "SELECT date_time, resource, tag, direction, traffic FROM stats
             WHERE resource = ?1 AND tag = ?2 AND date_time > ?3
             ORDER BY date_time ASC",
        )?;
        let rows = stmt
            .query_map(params![query.resource, query.tag, since], |row| {
                Ok(StatsRecord {
                    date_time: row.get(0)?,
                    resource: row.get(1)?,
                    tag: row.get(2)?,
                    direction: row.get(3)?,
                    traffic: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    async fn active_tags(&self, resource: &str, since: i64) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(
            "SELECT DISTINCT tag FROM stats
             WHERE resource = ?1 AND date_time >= ?2 AND traffic > 0
             ORDER BY tag",
        )?;
        let tags = stmt
            .query_map(params![resource, since], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(tags)
    }
}
