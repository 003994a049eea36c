//! Use-case services spanning several repositories.
//!
//! # Responsibility
//! - Run multi-step reads and writes inside one storage transaction.
//! - Log internal faults once, at the service boundary.
//!
//! # Invariants
//! - Services never commit partial work: any error drops the transaction.

pub mod dashboard;
pub mod quick_add;

use crate::repo::{ErrorKind, RepoError};
use log::error;

/// Emits `repo_internal_error` for storage/data faults; caller errors are not logged.
pub(crate) fn log_internal_error(op: &str, err: &RepoError) {
    if err.kind() == ErrorKind::Internal {
        error!("event=repo_internal_error module=service status=error op={op} error={err}");
    }
}
