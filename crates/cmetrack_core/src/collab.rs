//! Contracts for external collaborators the core depends on.
//!
//! Object storage and single-sign-on live outside this crate; hosts plug
//! them in through these traits.

use crate::model::person::Person;
use crate::repo::person_repo::SqlitePersonRepository;
use crate::repo::RepoError;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollabError {
    /// The collaborator refused the request (bad token, missing object).
    #[error("rejected by collaborator: {0}")]
    Rejected(String),
    /// The collaborator could not be reached or failed internally.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Binary object store for uploaded documents and images.
pub trait ObjectStorage {
    /// Stores `bytes` under `key` and returns the object's URL.
    fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, CollabError>;
    /// Returns a time-limited download URL for `key`.
    fn signed_download_url(&self, key: &str) -> Result<String, CollabError>;
    fn delete(&self, key: &str) -> Result<(), CollabError>;
}

/// Identity asserted by a verified sign-on token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

pub trait TokenVerifier {
    fn verify(&self, token: &str) -> Result<VerifiedIdentity, CollabError>;
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Token(#[from] CollabError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub identity: VerifiedIdentity,
    pub person: Person,
}

/// Verifies `token` and resolves the matching person by email.
///
/// # Errors
/// - `Token` when verification fails.
/// - `Repo(NotFound)` when no person has the verified email.
pub fn resolve_session(
    verifier: &dyn TokenVerifier,
    conn: &Connection,
    token: &str,
) -> Result<Session, SessionError> {
    let identity = verifier.verify(token)?;
    let person = SqlitePersonRepository::new(conn)
        .find_by_email(&identity.email)?
        .ok_or_else(|| RepoError::not_found("person", &identity.email))?;
    Ok(Session { identity, person })
}
