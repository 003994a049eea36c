//! Threaded person note repository.
//!
//! # Responsibility
//! - Persist notes written about a person, optionally as replies.
//! - Return notes with the author's display name resolved.
//!
//! # Invariants
//! - Content is trimmed and never empty.
//! - A reply belongs to the same subject person as its parent.
//! - Deleting a note removes its replies transitively (storage cascade).

use super::person_repo::joined_display_name;
use super::support::{
    collect_rows, delete_by_id, ensure_exists, first_row, now_ms, opt_uuid_col, require_text,
    uuid_col,
};
use super::{RepoError, RepoResult};
use crate::model::note::{NewNote, NoteId, PersonNote};
use crate::model::page::Deleted;
use crate::model::person::PersonId;
use log::info;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const NOTE_RESOURCE: &str = "note";
const NOTE_COLUMNS: &str = "n.id, n.person_id, n.author_id, a.title AS author_title,
    a.first_name AS author_first_name, a.last_name AS author_last_name, n.parent_id,
    n.content, n.created_at, n.updated_at";
const NOTE_FROM: &str = "FROM person_notes n LEFT JOIN people a ON a.id = n.author_id";

/// Repository interface for threaded notes.
pub trait NoteRepository {
    /// Creates one note (or reply) and returns it with the author resolved.
    fn create_note(&self, note: &NewNote) -> RepoResult<PersonNote>;
    /// Gets one note by id.
    fn get_note(&self, id: NoteId) -> RepoResult<PersonNote>;
    /// Replaces note content.
    fn update_note(&self, id: NoteId, content: &str) -> RepoResult<PersonNote>;
    /// Deletes a note and every reply beneath it.
    fn delete_note(&self, id: NoteId) -> RepoResult<Deleted>;
    /// Lists all notes about one person, oldest first.
    fn list_for_person(&self, person_id: PersonId) -> RepoResult<Vec<PersonNote>>;
}

/// SQLite-backed threaded note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn find(&self, id: NoteId) -> RepoResult<Option<PersonNote>> {
        first_row(
            self.conn,
            &format!("SELECT {NOTE_COLUMNS} {NOTE_FROM} WHERE n.id = ?1;"),
            [id.to_string()],
            parse_note_row,
        )
    }

    fn ensure_same_subject(&self, parent_id: NoteId, person_id: PersonId) -> RepoResult<()> {
        let parent = self
            .find(parent_id)?
            .ok_or_else(|| RepoError::not_found(NOTE_RESOURCE, parent_id))?;
        if parent.person_id != person_id {
            return Err(RepoError::Validation(
                "parent note belongs to a different person".to_string(),
            ));
        }
        Ok(())
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note(&self, note: &NewNote) -> RepoResult<PersonNote> {
        let content = require_text("content", &note.content)?;
        ensure_exists(self.conn, "people", "person", note.person_id)?;
        ensure_exists(self.conn, "people", "person", note.author_id)?;
        if let Some(parent_id) = note.parent_id {
            self.ensure_same_subject(parent_id, note.person_id)?;
        }

        let id = Uuid::new_v4();
        let now = now_ms();
        self.conn.execute(
            "INSERT INTO person_notes (
                id, person_id, author_id, parent_id, content, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6);",
            params![
                id.to_string(),
                note.person_id.to_string(),
                note.author_id.to_string(),
                note.parent_id.map(|parent| parent.to_string()),
                content,
                now,
            ],
        )?;
        info!(
            "event=note_create module=repo status=ok note_id={id} reply={}",
            note.parent_id.is_some()
        );
        self.get_note(id)
    }

    fn get_note(&self, id: NoteId) -> RepoResult<PersonNote> {
        self.find(id)?
            .ok_or_else(|| RepoError::not_found(NOTE_RESOURCE, id))
    }

    fn update_note(&self, id: NoteId, content: &str) -> RepoResult<PersonNote> {
        let content = require_text("content", content)?;
        let changed = self.conn.execute(
            "UPDATE person_notes SET content = ?2, updated_at = ?3 WHERE id = ?1;",
            params![id.to_string(), content, now_ms()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(NOTE_RESOURCE, id));
        }
        self.get_note(id)
    }

    fn delete_note(&self, id: NoteId) -> RepoResult<Deleted> {
        delete_by_id(self.conn, "person_notes", NOTE_RESOURCE, id)
    }

    fn list_for_person(&self, person_id: PersonId) -> RepoResult<Vec<PersonNote>> {
        ensure_exists(self.conn, "people", "person", person_id)?;
        collect_rows(
            self.conn,
            &format!(
                "SELECT {NOTE_COLUMNS} {NOTE_FROM}
                 WHERE n.person_id = ?1
                 ORDER BY n.created_at ASC, n.rowid ASC;"
            ),
            [person_id.to_string()],
            parse_note_row,
        )
    }
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<PersonNote> {
    let author_name = match row.get::<_, Option<String>>("author_first_name")? {
        Some(_) => Some(joined_display_name(row, "author_")?),
        None => None,
    };
    Ok(PersonNote {
        id: uuid_col(row, "id")?,
        person_id: uuid_col(row, "person_id")?,
        author_id: opt_uuid_col(row, "author_id")?,
        author_name,
        parent_id: opt_uuid_col(row, "parent_id")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
