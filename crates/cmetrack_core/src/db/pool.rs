//! Bounded connection pool over a migrated SQLite file.
//!
//! Callers beyond `max_size` block until a connection is returned or
//! `connection_timeout` elapses.

use super::open::{configure_connection, open_db};
use super::DbResult;
use log::info;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Pool sizing and location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    pub database_path: PathBuf,
    pub max_size: u32,
    pub connection_timeout: Duration,
}

impl PoolSettings {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            max_size: 8,
            connection_timeout: Duration::from_secs(30),
        }
    }
}

/// Migrates the database once, then builds the pool.
///
/// Pooled connections only receive pragmas; schema work happens up front so
/// concurrent initializers never race on migrations.
pub fn open_pool(settings: &PoolSettings) -> DbResult<DbPool> {
    drop(open_db(&settings.database_path)?);

    let manager = SqliteConnectionManager::file(&settings.database_path)
        .with_init(|conn| {
            configure_connection(conn)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")
        });
    let pool = Pool::builder()
        .max_size(settings.max_size.max(1))
        .connection_timeout(settings.connection_timeout)
        .build(manager)?;

    info!(
        "event=pool_open module=db status=ok max_size={} timeout_ms={}",
        pool.max_size(),
        settings.connection_timeout.as_millis()
    );
    Ok(pool)
}
