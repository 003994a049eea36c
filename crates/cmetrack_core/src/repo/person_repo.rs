//! Person repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over `people` with filtered listing and group-by tallies.
//! - Hydrate person detail with enrollments, attendance, credits and
//!   credentials.
//!
//! # Invariants
//! - E-mail addresses are stored trimmed and lower-cased; storage keeps them
//!   unique (case-insensitive) when present.
//! - A patch that leaves `is_complete` absent but rewrites both `email` and
//!   `department` reconciles a quick-added record as complete.

use super::cme_repo::list_credits_for_person;
use super::credential_repo::list_credentials_for_person;
use super::support::{
    collect_rows, delete_by_id, fetch_page, first_row, map_constraint, now_ms, optional_text,
    require_text, uuid_col,
};
use super::{RepoError, RepoResult, ResourceRepository};
use crate::model::page::{Counts, Deleted, Page};
use crate::model::person::{
    display_name, NewPerson, Person, PersonDetail, PersonEnrollment, PersonId,
    PersonMeetingAttendance, PersonRole, PersonStatus, PersonSummary,
};
use crate::query::patch::normalize_email;
use crate::query::{
    build_patch, ColumnKind, FilterColumn, FilterKind, PageRequest, Predicate, QueryParams,
    ResourceDescriptor, UpdatableColumn,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use uuid::Uuid;

pub(crate) const DUPLICATE_EMAIL: &str = "a person with this email already exists";

pub const PERSON_RESOURCE: ResourceDescriptor = ResourceDescriptor {
    resource: "person",
    table: "people",
    columns_sql: "p.id, p.title, p.first_name, p.last_name, p.role, p.department, p.email,
        p.phone, p.status, p.is_complete, p.created_at, p.updated_at",
    from_sql: "FROM people p",
    filters: &[
        FilterColumn::new("role", "p.role", FilterKind::Status),
        FilterColumn::new("status", "p.status", FilterKind::Status),
        FilterColumn::new("department", "p.department", FilterKind::Exact),
        FilterColumn::new("is_complete", "p.is_complete", FilterKind::Bool),
    ],
    search_columns: &["p.first_name", "p.last_name", "p.email", "p.department"],
    order_by: "p.last_name COLLATE NOCASE ASC, p.first_name COLLATE NOCASE ASC, p.id ASC",
    updatable: &[
        UpdatableColumn::optional("title", ColumnKind::Text),
        UpdatableColumn::required("first_name", ColumnKind::Text),
        UpdatableColumn::required("last_name", ColumnKind::Text),
        UpdatableColumn::required("role", ColumnKind::Enum(PersonRole::VALUES)),
        UpdatableColumn::optional("department", ColumnKind::Text),
        UpdatableColumn::optional("email", ColumnKind::Email),
        UpdatableColumn::optional("phone", ColumnKind::Text),
        UpdatableColumn::required("status", ColumnKind::Enum(PersonStatus::VALUES)),
        UpdatableColumn::required("is_complete", ColumnKind::Bool),
    ],
};

/// SQLite-backed person repository.
pub struct SqlitePersonRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePersonRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Loads the bare person row without hydration.
    pub fn find(&self, id: PersonId) -> RepoResult<Option<Person>> {
        first_row(
            self.conn,
            &format!(
                "SELECT {} {} WHERE p.id = ?1;",
                PERSON_RESOURCE.columns_sql, PERSON_RESOURCE.from_sql
            ),
            [id.to_string()],
            parse_person_row,
        )
    }

    /// Case-insensitive lookup used by session identity and quick-add reuse.
    pub fn find_by_email(&self, email: &str) -> RepoResult<Option<Person>> {
        let Some(normalized) = normalize_email(email) else {
            return Ok(None);
        };
        first_row(
            self.conn,
            &format!(
                "SELECT {} {} WHERE p.email = ?1 COLLATE NOCASE;",
                PERSON_RESOURCE.columns_sql, PERSON_RESOURCE.from_sql
            ),
            [normalized],
            parse_person_row,
        )
    }

    fn require(&self, id: PersonId) -> RepoResult<Person> {
        self.find(id)?
            .ok_or_else(|| RepoError::not_found(PERSON_RESOURCE.resource, id))
    }

    fn tally(&self, column: &str, predicate: &Predicate) -> RepoResult<BTreeMap<String, u64>> {
        let sql = format!(
            "SELECT {column} AS bucket, COUNT(*) AS total {}{} GROUP BY {column} ORDER BY {column};",
            PERSON_RESOURCE.from_sql,
            predicate.where_sql()
        );
        let rows = collect_rows(
            self.conn,
            &sql,
            params_from_iter(predicate.binds().iter()),
            |row| {
                let bucket: String = row.get("bucket")?;
                let total: i64 = row.get("total")?;
                Ok((bucket, u64::try_from(total).unwrap_or_default()))
            },
        )?;
        Ok(rows.into_iter().collect())
    }
}

impl ResourceRepository for SqlitePersonRepository<'_> {
    type Record = Person;
    type Detail = PersonDetail;
    type Draft = NewPerson;

    fn list(&self, params: &QueryParams, page: PageRequest) -> RepoResult<Page<Person>> {
        let predicate = Predicate::from_params(&PERSON_RESOURCE, params);
        let mut listed = fetch_page(
            self.conn,
            &PERSON_RESOURCE,
            &predicate,
            PERSON_RESOURCE.order_by,
            page,
            parse_person_row,
        )?;

        let mut counts = Counts::new();
        counts.insert("status".to_string(), self.tally("p.status", &predicate)?);
        counts.insert("role".to_string(), self.tally("p.role", &predicate)?);
        listed.counts = Some(counts);
        Ok(listed)
    }

    fn get(&self, id: PersonId) -> RepoResult<PersonDetail> {
        let person = self.require(id)?;
        Ok(PersonDetail {
            enrollments: list_enrollments(self.conn, id)?,
            meetings: list_attendance(self.conn, id)?,
            cme_credits: list_credits_for_person(self.conn, id)?,
            credentials: list_credentials_for_person(self.conn, id)?,
            person,
        })
    }

    fn create(&self, draft: &NewPerson) -> RepoResult<Person> {
        let id = insert_person(self.conn, draft)?;
        self.require(id)
    }

    fn update(&self, id: PersonId, patch: &Map<String, JsonValue>) -> RepoResult<Person> {
        let mut patch = build_patch(&PERSON_RESOURCE, patch)?;
        if !patch.touches("is_complete") && patch.touches("email") && patch.touches("department")
        {
            patch.set("is_complete", Value::Integer(1));
        }

        let (sql, binds) = patch.into_update(
            PERSON_RESOURCE.table,
            "id = ?",
            [Value::Text(id.to_string())],
            now_ms(),
        );
        let changed = self
            .conn
            .execute(&sql, params_from_iter(binds.iter()))
            .map_err(|err| map_constraint(err, DUPLICATE_EMAIL))?;
        if changed == 0 {
            return Err(RepoError::not_found(PERSON_RESOURCE.resource, id));
        }
        self.require(id)
    }

    fn delete(&self, id: PersonId) -> RepoResult<Deleted> {
        delete_by_id(self.conn, PERSON_RESOURCE.table, PERSON_RESOURCE.resource, id)
    }
}

/// Validates and inserts one person row, returning its new id.
///
/// Shared by direct creation and quick-add so both paths apply the same
/// normalization.
pub(crate) fn insert_person(conn: &Connection, draft: &NewPerson) -> RepoResult<PersonId> {
    let first_name = require_text("first_name", &draft.first_name)?;
    let last_name = require_text("last_name", &draft.last_name)?;
    let email = match optional_text(draft.email.as_deref()) {
        Some(raw) => Some(normalize_email(&raw).ok_or_else(|| {
            RepoError::Validation("`email` must be a valid email address".to_string())
        })?),
        None => None,
    };

    let id = Uuid::new_v4();
    let now = now_ms();
    conn.execute(
        "INSERT INTO people (
            id, title, first_name, last_name, role, department, email, phone,
            status, is_complete, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11);",
        params![
            id.to_string(),
            optional_text(draft.title.as_deref()),
            first_name,
            last_name,
            draft.role.unwrap_or(PersonRole::Other),
            optional_text(draft.department.as_deref()),
            email,
            optional_text(draft.phone.as_deref()),
            draft.status.unwrap_or(PersonStatus::Active),
            draft.is_complete.unwrap_or(true),
            now,
        ],
    )
    .map_err(|err| map_constraint(err, DUPLICATE_EMAIL))?;
    Ok(id)
}

/// Loads a compact person reference, if the row exists.
pub(crate) fn find_summary(conn: &Connection, id: PersonId) -> RepoResult<Option<PersonSummary>> {
    first_row(
        conn,
        "SELECT id, title, first_name, last_name, role, email FROM people WHERE id = ?1;",
        [id.to_string()],
        |row| {
            let title: Option<String> = row.get("title")?;
            let first_name: String = row.get("first_name")?;
            let last_name: String = row.get("last_name")?;
            Ok(PersonSummary {
                id: uuid_col(row, "id")?,
                display_name: display_name(title.as_deref(), &first_name, &last_name),
                role: row.get("role")?,
                email: row.get("email")?,
            })
        },
    )
}

/// Derives a display name from aliased `<prefix>title/first_name/last_name`
/// columns of a joined row.
pub(crate) fn joined_display_name(row: &Row<'_>, prefix: &str) -> RepoResult<String> {
    let title: Option<String> = row.get(format!("{prefix}title").as_str())?;
    let first_name: String = row.get(format!("{prefix}first_name").as_str())?;
    let last_name: String = row.get(format!("{prefix}last_name").as_str())?;
    Ok(display_name(title.as_deref(), &first_name, &last_name))
}

pub(crate) fn parse_person_row(row: &Row<'_>) -> RepoResult<Person> {
    let title: Option<String> = row.get("title")?;
    let first_name: String = row.get("first_name")?;
    let last_name: String = row.get("last_name")?;
    Ok(Person {
        id: uuid_col(row, "id")?,
        display_name: display_name(title.as_deref(), &first_name, &last_name),
        title,
        first_name,
        last_name,
        role: row.get("role")?,
        department: row.get("department")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        status: row.get("status")?,
        is_complete: row.get("is_complete")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn list_enrollments(conn: &Connection, person_id: PersonId) -> RepoResult<Vec<PersonEnrollment>> {
    collect_rows(
        conn,
        "SELECT ca.id, ca.course_id, c.course_number, c.name AS course_name,
                ca.role, ca.status, ca.created_at
         FROM course_attendees ca
         INNER JOIN courses c ON c.id = ca.course_id
         WHERE ca.person_id = ?1
         ORDER BY ca.created_at DESC, ca.id ASC;",
        [person_id.to_string()],
        |row| {
            Ok(PersonEnrollment {
                id: uuid_col(row, "id")?,
                course_id: uuid_col(row, "course_id")?,
                course_number: row.get("course_number")?,
                course_name: row.get("course_name")?,
                role: row.get("role")?,
                status: row.get("status")?,
                created_at: row.get("created_at")?,
            })
        },
    )
}

fn list_attendance(
    conn: &Connection,
    person_id: PersonId,
) -> RepoResult<Vec<PersonMeetingAttendance>> {
    collect_rows(
        conn,
        "SELECT ma.id, ma.meeting_id, m.title AS meeting_title, m.meeting_date,
                m.status AS meeting_status, ma.attended
         FROM meeting_attendees ma
         INNER JOIN meetings m ON m.id = ma.meeting_id
         WHERE ma.person_id = ?1
         ORDER BY m.meeting_date DESC, ma.id ASC;",
        [person_id.to_string()],
        |row| {
            Ok(PersonMeetingAttendance {
                id: uuid_col(row, "id")?,
                meeting_id: uuid_col(row, "meeting_id")?,
                meeting_title: row.get("meeting_title")?,
                meeting_date: row.get("meeting_date")?,
                meeting_status: row.get("meeting_status")?,
                attended: row.get("attended")?,
            })
        },
    )
}
