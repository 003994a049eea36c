//! Core record-keeping logic for cmetrack.
//!
//! People, courses, meetings, CME activities/credits, issued credentials and
//! threaded notes, stored in SQLite. This crate owns filter/pagination
//! assembly, relation hydration, the dashboard aggregate and quick-add
//! resolution; transports and UI live elsewhere.

pub mod collab;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, open_pool, DbError, DbPool, PoolSettings};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::page::{Deleted, Page};
pub use query::{PageLimits, PageRequest, QueryParams};
pub use repo::{ErrorKind, RepoError, RepoResult, ResourceRepository};
pub use service::dashboard::{DashboardRequest, DashboardService, DashboardSnapshot};
pub use service::quick_add::{AttendeeRequest, QuickAddOutcome, QuickAddResolver};

/// Minimal health-check API for embedding hosts.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
