//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define per-resource list/get/create/update/delete contracts.
//! - Isolate SQLite query details from service orchestration.
//! - Hydrate detail responses with their dependent collections.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`,
//!   `Validation`) in addition to storage transport errors.
//! - Uniqueness and cascade rules are enforced by storage constraints and
//!   surfaced through [`RepoError`], never re-checked in memory.

pub mod cme_repo;
pub mod course_repo;
pub mod credential_repo;
mod error;
pub mod meeting_repo;
pub mod note_repo;
pub mod person_repo;
pub(crate) mod support;

pub use error::{ErrorKind, RepoError, RepoResult};

use crate::model::page::{Deleted, Page};
use crate::query::{PageRequest, QueryParams};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

/// Uniform CRUD contract shared by every top-level resource.
pub trait ResourceRepository {
    /// Row shape returned by listings, create and update.
    type Record;
    /// Hydrated shape returned by `get`.
    type Detail;
    /// Create payload.
    type Draft;

    /// Lists one page of rows matching the recognized filters in `params`.
    fn list(&self, params: &QueryParams, page: PageRequest) -> RepoResult<Page<Self::Record>>;
    /// Loads one row with its dependent collections.
    fn get(&self, id: Uuid) -> RepoResult<Self::Detail>;
    /// Validates and inserts a new row.
    fn create(&self, draft: &Self::Draft) -> RepoResult<Self::Record>;
    /// Rewrites only the allow-listed keys present in `patch`.
    fn update(&self, id: Uuid, patch: &Map<String, JsonValue>) -> RepoResult<Self::Record>;
    /// Removes one row; storage cascades take dependent rows with it.
    fn delete(&self, id: Uuid) -> RepoResult<Deleted>;
}
