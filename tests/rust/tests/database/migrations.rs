//! Schema creation and migration bookkeeping

use pretty_assertions::assert_eq;
use sbpanel_storage::Database;
use tests::db::TestDatabase;

fn tables(db: &Database) -> Vec<String> {
    let mut stmt = db
        .connection()
        .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

fn applied_versions(db: &Database) -> Vec<i64> {
    let mut stmt = db
        .connection()
        .prepare("SELECT version FROM schema_migrations ORDER BY version")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<i64>, _>>()
        .unwrap()
}

#[test]
fn test_fresh_database_has_all_tables() {
    let test_db = TestDatabase::new();

    assert_eq!(
        tables(&test_db.db),
        vec![
            "changes",
            "config_objects",
            "inbounds",
            "schema_migrations",
            "settings",
            "stats",
            "tokens",
            "users",
        ]
    );
    assert!(test_db.db_path().exists());
}

#[test]
fn test_reopen_does_not_rerun_migrations() {
    let test_db = TestDatabase::new();
    let path = test_db.db_path().to_path_buf();
    assert_eq!(applied_versions(&test_db.db), vec![1]);

    test_db
        .db
        .connection()
        .execute("UPDATE settings SET value = '7' WHERE key = 'trafficAge'", [])
        .unwrap();

    let reopened = Database::open(&path).unwrap();
    assert_eq!(applied_versions(&reopened), vec![1]);

    // Seed rows are not re-inserted over edits
    let age: String = reopened
        .connection()
        .query_row(
            "SELECT value FROM settings WHERE key = 'trafficAge'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(age, "7");
}

#[test]
fn test_in_memory_database_is_migrated() {
    let test_db = TestDatabase::in_memory();
    assert!(tables(&test_db.db).contains(&"inbounds".to_string()));
    assert_eq!(applied_versions(&test_db.db), vec![1]);
}
