//! SQLite storage bootstrap, pooling and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for cmetrack core.
//! - Hand out pooled connections with a bounded ceiling.
//! - Apply embedded schema migrations in deterministic order.
//!
//! # Invariants
//! - Applied migrations are tracked by name in `schema_migrations`.
//! - Core code must not read/write application data before migrations succeed.
//! - Every handed-out connection has `foreign_keys=ON`; cascade rules depend on it.

use thiserror::Error;

pub mod migrations;
mod open;
mod pool;

pub use open::{configure_connection, open_db, open_db_in_memory};
pub use pool::{open_pool, DbPool, PoolSettings, PooledConn};

pub type DbResult<T> = Result<T, DbError>;

/// Storage transport and bootstrap failures.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("database has migration `{name}` applied that this build does not know")]
    UnknownMigration { name: String },
}
