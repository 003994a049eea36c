//! Threaded person note model.

use super::person::PersonId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NoteId = Uuid;

/// One note about a subject person; `parent_id` links replies to a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonNote {
    pub id: NoteId,
    pub person_id: PersonId,
    /// `None` once the author record has been removed.
    pub author_id: Option<PersonId>,
    pub author_name: Option<String>,
    pub parent_id: Option<NoteId>,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub person_id: PersonId,
    pub author_id: PersonId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<NoteId>,
}
