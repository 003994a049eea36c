use crate::db::DbError;
use serde::Serialize;
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error taxonomy surfaced to callers of the core.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Missing/empty required field or unusable input; nothing was written.
    #[error("{0}")]
    Validation(String),
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },
    /// Uniqueness violation reported by storage, with a resource message.
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Db(#[from] DbError),
    /// Persisted row cannot be converted to a valid read model.
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

/// Coarse class of a [`RepoError`], for transport-level status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

impl RepoError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Db(_) | Self::InvalidData(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand back to a caller; internal faults stay opaque.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<r2d2::Error> for RepoError {
    fn from(value: r2d2::Error) -> Self {
        Self::Db(DbError::Pool(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Validation(format!("invalid JSON body: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, RepoError};

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = RepoError::InvalidData("bad uuid `x` in people.id".to_string());
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "internal error");
    }

    #[test]
    fn caller_errors_keep_their_message() {
        let err = RepoError::not_found("person", "abc");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.public_message(), "person not found: abc");
    }
}
