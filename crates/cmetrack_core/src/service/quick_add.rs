//! Quick-add attendee resolution.
//!
//! # Responsibility
//! - Accept an attendee request naming either an existing person or a
//!   minimal new one.
//! - Get-or-create the person by email, then insert the join row.
//!
//! # Invariants
//! - Person resolution and the join insert share one IMMEDIATE transaction;
//!   a failed join insert leaves no new person behind.
//! - Quick-added people start with `is_complete=false`, `ACTIVE`, `OTHER`.

use super::log_internal_error;
use crate::model::course::{AttendeeRole, CourseAttendee, CourseId};
use crate::model::meeting::{MeetingAttendee, MeetingId};
use crate::model::person::{NewPerson, PersonId, PersonRole, PersonStatus};
use crate::query::patch::normalize_email;
use crate::repo::course_repo::SqliteCourseRepository;
use crate::repo::meeting_repo::SqliteMeetingRepository;
use crate::repo::person_repo::{insert_person, SqlitePersonRepository};
use crate::repo::{RepoError, RepoResult};
use log::info;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

/// Attendee-add body: an existing `person_id`, or quick-add name fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeRequest {
    #[serde(default)]
    pub person_id: Option<PersonId>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Course enrollments only; defaults to `ATTENDEE`.
    #[serde(default)]
    pub role: Option<AttendeeRole>,
    /// Meeting attendance only; defaults to `false`.
    #[serde(default)]
    pub attended: Option<bool>,
}

impl AttendeeRequest {
    pub fn existing(person_id: PersonId) -> Self {
        Self {
            person_id: Some(person_id),
            ..Self::default()
        }
    }

    pub fn quick(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickAddOutcome<T> {
    pub attendee: T,
    /// `true` when a new person row was inserted for this request.
    pub person_created: bool,
}

pub struct QuickAddResolver<'conn> {
    conn: &'conn Connection,
}

impl<'conn> QuickAddResolver<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Enrolls the requested person in a course.
    pub fn add_course_attendee(
        &self,
        course_id: CourseId,
        request: &AttendeeRequest,
    ) -> RepoResult<QuickAddOutcome<CourseAttendee>> {
        let role = request.role.unwrap_or(AttendeeRole::Attendee);
        self.run("course", request, |conn, person_id| {
            SqliteCourseRepository::new(conn).add_attendee(course_id, person_id, role)
        })
    }

    /// Registers the requested person for a meeting.
    pub fn add_meeting_attendee(
        &self,
        meeting_id: MeetingId,
        request: &AttendeeRequest,
    ) -> RepoResult<QuickAddOutcome<MeetingAttendee>> {
        let attended = request.attended.unwrap_or(false);
        self.run("meeting", request, |conn, person_id| {
            SqliteMeetingRepository::new(conn).add_attendee(meeting_id, person_id, attended)
        })
    }

    fn run<T>(
        &self,
        target: &'static str,
        request: &AttendeeRequest,
        insert: impl FnOnce(&Connection, PersonId) -> RepoResult<T>,
    ) -> RepoResult<QuickAddOutcome<T>> {
        match self.run_in_tx(request, insert) {
            Ok((person_id, outcome)) => {
                info!(
                    "event=quick_add module=service status=ok target={target} person_id={person_id} person_created={}",
                    outcome.person_created
                );
                Ok(outcome)
            }
            Err(err) => {
                info!(
                    "event=quick_add module=service status=error target={target} kind={:?}",
                    err.kind()
                );
                log_internal_error("quick_add", &err);
                Err(err)
            }
        }
    }

    fn run_in_tx<T>(
        &self,
        request: &AttendeeRequest,
        insert: impl FnOnce(&Connection, PersonId) -> RepoResult<T>,
    ) -> RepoResult<(PersonId, QuickAddOutcome<T>)> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let (person_id, person_created) = resolve_person(&tx, request)?;
        let attendee = insert(&tx, person_id)?;
        tx.commit()?;
        Ok((
            person_id,
            QuickAddOutcome {
                attendee,
                person_created,
            },
        ))
    }
}

/// Returns the person id to attach and whether it was just created.
fn resolve_person(conn: &Connection, request: &AttendeeRequest) -> RepoResult<(PersonId, bool)> {
    if let Some(person_id) = request.person_id {
        return Ok((person_id, false));
    }

    let first_name = required_name("first_name", request.first_name.as_deref())?;
    let last_name = required_name("last_name", request.last_name.as_deref())?;
    let email = match request.email.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(normalize_email(raw).ok_or_else(|| {
            RepoError::Validation("`email` must be a valid email address".to_string())
        })?),
        _ => None,
    };

    if let Some(email) = email.as_deref() {
        if let Some(existing) = SqlitePersonRepository::new(conn).find_by_email(email)? {
            return Ok((existing.id, false));
        }
    }

    let draft = NewPerson {
        email,
        role: Some(PersonRole::Other),
        status: Some(PersonStatus::Active),
        is_complete: Some(false),
        ..NewPerson::new(first_name, last_name)
    };
    Ok((insert_person(conn, &draft)?, true))
}

fn required_name(field: &str, value: Option<&str>) -> RepoResult<String> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(RepoError::Validation(format!("`{field}` is required"))),
    }
}
