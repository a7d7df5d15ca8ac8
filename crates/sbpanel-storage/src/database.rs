//! Database manager for SQLite storage.
//!
//! ## Migration System
//!
//! Migrations are numbered sequentially (001, 002, ...) and stored in the
//! `migrations/` directory. Each migration runs exactly once, tracked via the
//! `schema_migrations` table.
//!
//! ## Export / import
//!
//! `export_to` writes a consistent copy using the SQLite online backup API.
//! `restore_from` checks that the candidate file is an sbpanel database and
//! then replaces the live contents with it.

use anyhow::{bail, Context, Result};
use rusqlite::backup::Progress;
use rusqlite::{Connection, DatabaseName};
use std::path::Path;
use tracing::{debug, info};

/// A database migration with version number and SQL content.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial",
    sql: include_str!("migrations/001_initial.sql"),
}];

/// Tables an imported file must already carry
const REQUIRED_TABLES: &[&str] = &["inbounds", "users", "tokens", "settings"];

/// SQLite database wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path.
    ///
    /// If the database doesn't exist, it will be created.
    /// All pending migrations will be automatically applied.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        debug!("[Database] Opened database at {:?}", path);

        let db = Self { conn };
        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        debug!("[Database] Opened in-memory database");

        let db = Self { conn };
        db.run_migrations()?;

        Ok(db)
    }

    /// Run all pending database migrations.
    fn run_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version = self.schema_version()?;

        debug!(
            "[Database] Schema version {}, latest available {}",
            current_version,
            MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
        );

        for migration in MIGRATIONS {
            if migration.version <= current_version {
                continue;
            }

            info!(
                "[Database] Running migration {} ({})",
                migration.version, migration.name
            );

            let tx = self.conn.unchecked_transaction()?;

            self.conn.execute_batch(migration.sql).with_context(|| {
                format!(
                    "Failed to run migration {} ({})",
                    migration.version, migration.name
                )
            })?;

            self.conn.execute(
                "INSERT OR REPLACE INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, datetime('now'))",
                rusqlite::params![migration.version, migration.name],
            )?;

            tx.commit()?;
        }

        Ok(())
    }

    /// Current schema version (highest applied migration).
    fn schema_version(&self) -> Result<i64> {
        let version = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a transaction.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let result = f(&self.conn)?;
        tx.commit()?;
        Ok(result)
    }

    /// Write a consistent snapshot of the database to `dest`.
    pub fn export_to(&self, dest: &Path) -> Result<()> {
        self.conn
            .backup(DatabaseName::Main, dest, None::<fn(Progress)>)
            .with_context(|| format!("Failed to export database to {:?}", dest))?;
        info!("[Database] Exported database to {:?}", dest);
        Ok(())
    }

    /// Replace the live contents with the database file at `src`.
    ///
    /// The file must be a SQLite database carrying the sbpanel tables; newer
    /// migrations are applied after the restore.
    pub fn restore_from(&mut self, src: &Path) -> Result<()> {
        Self::check_importable(src)?;

        self.conn
            .restore(DatabaseName::Main, src, None::<fn(Progress)>)
            .with_context(|| format!("Failed to restore database from {:?}", src))?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.run_migrations()?;

        info!("[Database] Restored database from {:?}", src);
        Ok(())
    }

    fn check_importable(src: &Path) -> Result<()> {
        let candidate = Connection::open_with_flags(src, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open import file {:?}", src))?;

        for table in REQUIRED_TABLES {
            let present: bool = candidate
                .query_row(
                    "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                    [*table],
                    |row| row.get(0),
                )
                .context("Import file is not a valid database")?;
            if !present {
                bail!("Import file is missing table '{}'", table);
            }
        }
        Ok(())
    }
}
