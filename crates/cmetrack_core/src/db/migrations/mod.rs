//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically and record them by name.
//!
//! # Invariants
//! - Migration names sort in application order and are never renamed.
//! - A database carrying a migration name unknown to this build is rejected.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy)]
struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    name: "0001_init",
    sql: include_str!("0001_init.sql"),
}];

const TRACKING_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    name TEXT PRIMARY KEY NOT NULL,
    applied_at INTEGER NOT NULL
);";

/// Returns the names of every migration known by this binary, in order.
pub fn known_migrations() -> Vec<&'static str> {
    MIGRATIONS.iter().map(|migration| migration.name).collect()
}

/// Returns the names recorded in `schema_migrations`, sorted.
pub fn applied_migrations(conn: &Connection) -> DbResult<Vec<String>> {
    conn.execute_batch(TRACKING_TABLE_SQL)?;
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY name ASC;")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let applied: BTreeSet<String> = applied_migrations(conn)?.into_iter().collect();
    let known: BTreeSet<&str> = MIGRATIONS.iter().map(|migration| migration.name).collect();

    if let Some(unknown) = applied.iter().find(|name| !known.contains(name.as_str())) {
        return Err(DbError::UnknownMigration {
            name: unknown.clone(),
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| !applied.contains(migration.name))
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, ?2);",
            (migration.name, chrono::Utc::now().timestamp_millis()),
        )?;
    }
    tx.commit()?;

    info!(
        "event=migrations_apply module=db status=ok applied={}",
        pending.len()
    );
    Ok(())
}
