use cmetrack_core::db::migrations::{applied_migrations, known_migrations};
use cmetrack_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

const TABLES: &[&str] = &[
    "people",
    "courses",
    "course_attendees",
    "meetings",
    "meeting_attendees",
    "cme_activities",
    "cme_credits",
    "credential_templates",
    "issued_credentials",
    "person_notes",
];

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(applied_migrations(&conn).unwrap(), known_migrations());
    for table in TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn opened_connections_enforce_foreign_keys() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cmetrack.db");

    let first = open_db(&path).unwrap();
    assert_eq!(applied_migrations(&first).unwrap(), known_migrations());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(applied_migrations(&second).unwrap(), known_migrations());
    assert_table_exists(&second, "people");
}

#[test]
fn opening_database_with_unknown_migration_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    drop(open_db(&path).unwrap());
    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "INSERT INTO schema_migrations (name, applied_at) VALUES ('9999_future', 0);",
        [],
    )
    .unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnknownMigration { name } => assert_eq!(name, "9999_future"),
        other => panic!("unexpected error: {other}"),
    }
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
