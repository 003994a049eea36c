//! Meeting and attendance repository.
//!
//! # Responsibility
//! - CRUD over `meetings` with date-aware status filtering.
//! - Attendance (`meeting_attendees`) add/mark/remove/list.
//! - Hydrate meeting detail with course, presenter and attendees.
//!
//! # Invariants
//! - Status filter `SCHEDULED` means flagged scheduled AND dated today or
//!   later; listing sorts soonest first.
//! - Status filter `COMPLETED` means flagged completed OR dated before today,
//!   whatever the flag says; listing sorts most recent first.
//! - Status filter `CANCELLED` matches the flag only.

use super::course_repo::COURSE_RESOURCE;
use super::person_repo::{find_summary, joined_display_name};
use super::support::{
    collect_rows, delete_by_id, ensure_exists, ensure_ordered, fetch_page, first_row,
    map_constraint, now_ms, opt_uuid_col, optional_text, require_text, uuid_col,
};
use super::{RepoError, RepoResult, ResourceRepository};
use crate::model::course::{CourseId, CourseSummary};
use crate::model::meeting::{
    Meeting, MeetingAttendee, MeetingDetail, MeetingId, MeetingStatus, NewMeeting,
};
use crate::model::page::{Deleted, Page};
use crate::model::person::PersonId;
use crate::query::patch::is_valid_time;
use crate::query::{
    build_patch, normalize_status_filter, ColumnKind, FilterColumn, FilterKind, PageRequest,
    Predicate, QueryParams, ResourceDescriptor, UpdatableColumn,
};
use chrono::{Local, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

const DUPLICATE_MEETING_ID: &str = "meeting id already exists";
const DUPLICATE_ATTENDANCE: &str = "person is already attending this meeting";
const MEETING_TIMES_REVERSED: &str = "`end_time` cannot be before `start_time`";
const UPCOMING_ORDER: &str = "m.meeting_date ASC, m.start_time ASC, m.id ASC";

pub const MEETING_RESOURCE: ResourceDescriptor = ResourceDescriptor {
    resource: "meeting",
    table: "meetings",
    columns_sql: "m.id, m.course_id, c.course_number, m.title, m.meeting_date, m.start_time,
        m.end_time, m.location, m.description, m.status, m.presenter_id,
        pr.title AS presenter_title, pr.first_name AS presenter_first_name,
        pr.last_name AS presenter_last_name, m.cme_credits, m.created_at, m.updated_at",
    from_sql: "FROM meetings m
        LEFT JOIN courses c ON c.id = m.course_id
        LEFT JOIN people pr ON pr.id = m.presenter_id",
    filters: &[
        FilterColumn::new("course_id", "m.course_id", FilterKind::Exact),
        FilterColumn::new("presenter_id", "m.presenter_id", FilterKind::Exact),
        FilterColumn::new("from", "m.meeting_date", FilterKind::DateFrom),
        FilterColumn::new("to", "m.meeting_date", FilterKind::DateTo),
    ],
    search_columns: &["m.title", "m.location"],
    order_by: "m.meeting_date DESC, m.start_time DESC, m.id DESC",
    updatable: &[
        UpdatableColumn::optional("course_id", ColumnKind::Reference),
        UpdatableColumn::required("title", ColumnKind::Text),
        UpdatableColumn::required("meeting_date", ColumnKind::Date),
        UpdatableColumn::optional("start_time", ColumnKind::Time),
        UpdatableColumn::optional("end_time", ColumnKind::Time),
        UpdatableColumn::optional("location", ColumnKind::Text),
        UpdatableColumn::optional("description", ColumnKind::Text),
        UpdatableColumn::required("status", ColumnKind::Enum(MeetingStatus::VALUES)),
        UpdatableColumn::optional("presenter_id", ColumnKind::Reference),
        UpdatableColumn::required("cme_credits", ColumnKind::Real),
    ],
};

const ATTENDEE_COLUMNS: &str = "ma.id, ma.meeting_id, ma.person_id, p.title AS person_title,
    p.first_name AS person_first_name, p.last_name AS person_last_name, p.is_complete,
    ma.attended, ma.created_at, ma.updated_at";
const ATTENDEE_FROM: &str = "FROM meeting_attendees ma INNER JOIN people p ON p.id = ma.person_id";

/// SQLite-backed meeting repository.
///
/// Carries the calendar day used to split upcoming from past meetings.
pub struct SqliteMeetingRepository<'conn> {
    conn: &'conn Connection,
    today: NaiveDate,
}

impl<'conn> SqliteMeetingRepository<'conn> {
    /// Uses the local calendar day as "today".
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_today(conn, Local::now().date_naive())
    }

    pub fn with_today(conn: &'conn Connection, today: NaiveDate) -> Self {
        Self { conn, today }
    }

    pub fn find(&self, id: MeetingId) -> RepoResult<Option<Meeting>> {
        first_row(
            self.conn,
            &format!(
                "SELECT {} {} WHERE m.id = ?1;",
                MEETING_RESOURCE.columns_sql, MEETING_RESOURCE.from_sql
            ),
            [id.to_string()],
            parse_meeting_row,
        )
    }

    fn require(&self, id: MeetingId) -> RepoResult<Meeting> {
        self.find(id)?
            .ok_or_else(|| RepoError::not_found(MEETING_RESOURCE.resource, id))
    }

    /// Registers an existing person for a meeting.
    ///
    /// # Errors
    /// - `NotFound` when the meeting or person does not exist.
    /// - `Conflict` when the person is already registered.
    pub fn add_attendee(
        &self,
        meeting_id: MeetingId,
        person_id: PersonId,
        attended: bool,
    ) -> RepoResult<MeetingAttendee> {
        ensure_exists(self.conn, "meetings", MEETING_RESOURCE.resource, meeting_id)?;
        ensure_exists(self.conn, "people", "person", person_id)?;

        let now = now_ms();
        self.conn
            .execute(
                "INSERT INTO meeting_attendees (
                    id, meeting_id, person_id, attended, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?5);",
                params![
                    Uuid::new_v4().to_string(),
                    meeting_id.to_string(),
                    person_id.to_string(),
                    attended,
                    now,
                ],
            )
            .map_err(|err| map_constraint(err, DUPLICATE_ATTENDANCE))?;
        self.require_attendee(meeting_id, person_id)
    }

    pub fn set_attended(
        &self,
        meeting_id: MeetingId,
        person_id: PersonId,
        attended: bool,
    ) -> RepoResult<MeetingAttendee> {
        let changed = self.conn.execute(
            "UPDATE meeting_attendees
             SET attended = ?3, updated_at = ?4
             WHERE meeting_id = ?1 AND person_id = ?2;",
            params![meeting_id.to_string(), person_id.to_string(), attended, now_ms()],
        )?;
        if changed == 0 {
            return Err(attendee_not_found(meeting_id, person_id));
        }
        self.require_attendee(meeting_id, person_id)
    }

    pub fn remove_attendee(&self, meeting_id: MeetingId, person_id: PersonId) -> RepoResult<Deleted> {
        let changed = self.conn.execute(
            "DELETE FROM meeting_attendees WHERE meeting_id = ?1 AND person_id = ?2;",
            [meeting_id.to_string(), person_id.to_string()],
        )?;
        if changed == 0 {
            return Err(attendee_not_found(meeting_id, person_id));
        }
        Ok(Deleted::YES)
    }

    pub fn list_attendees(&self, meeting_id: MeetingId) -> RepoResult<Vec<MeetingAttendee>> {
        collect_rows(
            self.conn,
            &format!(
                "SELECT {ATTENDEE_COLUMNS} {ATTENDEE_FROM}
                 WHERE ma.meeting_id = ?1
                 ORDER BY p.last_name COLLATE NOCASE ASC, p.first_name COLLATE NOCASE ASC, ma.id ASC;"
            ),
            [meeting_id.to_string()],
            parse_attendee_row,
        )
    }

    fn require_attendee(&self, meeting_id: MeetingId, person_id: PersonId) -> RepoResult<MeetingAttendee> {
        first_row(
            self.conn,
            &format!(
                "SELECT {ATTENDEE_COLUMNS} {ATTENDEE_FROM}
                 WHERE ma.meeting_id = ?1 AND ma.person_id = ?2;"
            ),
            [meeting_id.to_string(), person_id.to_string()],
            parse_attendee_row,
        )?
        .ok_or_else(|| attendee_not_found(meeting_id, person_id))
    }

    fn find_course_summary(&self, course_id: CourseId) -> RepoResult<Option<CourseSummary>> {
        first_row(
            self.conn,
            &format!(
                "SELECT c.id, c.course_number, c.name {} WHERE c.id = ?1;",
                COURSE_RESOURCE.from_sql
            ),
            [course_id.to_string()],
            |row| {
                Ok(CourseSummary {
                    id: uuid_col(row, "id")?,
                    course_number: row.get("course_number")?,
                    name: row.get("name")?,
                })
            },
        )
    }

    /// Adds the date-aware status clause and picks the matching sort order.
    fn apply_status_filter(&self, predicate: &mut Predicate, params: &QueryParams) -> &'static str {
        let today = Value::Text(self.today.format("%Y-%m-%d").to_string());
        let status = params.get("status").and_then(normalize_status_filter);

        match status.as_deref() {
            Some(status) if status == MeetingStatus::Scheduled.as_db() => {
                predicate.push(
                    "m.status = ? AND m.meeting_date >= ?",
                    [Value::Text(status.to_string()), today],
                );
                UPCOMING_ORDER
            }
            Some(status) if status == MeetingStatus::Completed.as_db() => {
                predicate.push(
                    "(m.status = ? OR m.meeting_date < ?)",
                    [Value::Text(status.to_string()), today],
                );
                MEETING_RESOURCE.order_by
            }
            Some(status) => {
                predicate.push("m.status = ?", [Value::Text(status.to_string())]);
                MEETING_RESOURCE.order_by
            }
            None => MEETING_RESOURCE.order_by,
        }
    }
}

impl ResourceRepository for SqliteMeetingRepository<'_> {
    type Record = Meeting;
    type Detail = MeetingDetail;
    type Draft = NewMeeting;

    fn list(&self, params: &QueryParams, page: PageRequest) -> RepoResult<Page<Meeting>> {
        let mut predicate = Predicate::from_params(&MEETING_RESOURCE, params);
        let order_by = self.apply_status_filter(&mut predicate, params);
        fetch_page(
            self.conn,
            &MEETING_RESOURCE,
            &predicate,
            order_by,
            page,
            parse_meeting_row,
        )
    }

    fn get(&self, id: MeetingId) -> RepoResult<MeetingDetail> {
        let meeting = self.require(id)?;
        let course = match meeting.course_id {
            Some(course_id) => self.find_course_summary(course_id)?,
            None => None,
        };
        let presenter = match meeting.presenter_id {
            Some(presenter_id) => find_summary(self.conn, presenter_id)?,
            None => None,
        };
        Ok(MeetingDetail {
            course,
            presenter,
            attendees: self.list_attendees(id)?,
            meeting,
        })
    }

    fn create(&self, draft: &NewMeeting) -> RepoResult<Meeting> {
        let title = require_text("title", &draft.title)?;
        let meeting_date = draft
            .meeting_date
            .ok_or_else(|| RepoError::Validation("`meeting_date` is required".to_string()))?;
        let start_time = checked_time("start_time", draft.start_time.as_deref())?;
        let end_time = checked_time("end_time", draft.end_time.as_deref())?;
        ensure_ordered(start_time.as_ref(), end_time.as_ref(), MEETING_TIMES_REVERSED)?;
        let cme_credits = draft.cme_credits.unwrap_or(0.0);
        if !cme_credits.is_finite() || cme_credits < 0.0 {
            return Err(RepoError::Validation(
                "`cme_credits` must be a non-negative number".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let now = now_ms();
        self.conn
            .execute(
                "INSERT INTO meetings (
                    id, course_id, title, meeting_date, start_time, end_time, location,
                    description, status, presenter_id, cme_credits, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12);",
                params![
                    id.to_string(),
                    draft.course_id.map(|id| id.to_string()),
                    title,
                    meeting_date,
                    start_time,
                    end_time,
                    optional_text(draft.location.as_deref()),
                    optional_text(draft.description.as_deref()),
                    draft.status.unwrap_or(MeetingStatus::Scheduled),
                    draft.presenter_id.map(|id| id.to_string()),
                    cme_credits,
                    now,
                ],
            )
            .map_err(|err| map_constraint(err, DUPLICATE_MEETING_ID))?;
        self.require(id)
    }

    fn update(&self, id: MeetingId, patch: &Map<String, JsonValue>) -> RepoResult<Meeting> {
        let patch = build_patch(&MEETING_RESOURCE, patch)?;
        if patch.touches("start_time") || patch.touches("end_time") {
            let current = self.require(id)?;
            ensure_ordered(
                patch.merged("start_time", current.start_time).as_ref(),
                patch.merged("end_time", current.end_time).as_ref(),
                MEETING_TIMES_REVERSED,
            )?;
        }
        let (sql, binds) = patch.into_update(
            MEETING_RESOURCE.table,
            "id = ?",
            [Value::Text(id.to_string())],
            now_ms(),
        );
        let changed = self
            .conn
            .execute(&sql, params_from_iter(binds.iter()))
            .map_err(|err| map_constraint(err, DUPLICATE_MEETING_ID))?;
        if changed == 0 {
            return Err(RepoError::not_found(MEETING_RESOURCE.resource, id));
        }
        self.require(id)
    }

    fn delete(&self, id: MeetingId) -> RepoResult<Deleted> {
        delete_by_id(self.conn, MEETING_RESOURCE.table, MEETING_RESOURCE.resource, id)
    }
}

fn checked_time(field: &str, value: Option<&str>) -> RepoResult<Option<String>> {
    match optional_text(value) {
        Some(time) if is_valid_time(&time) => Ok(Some(time)),
        Some(_) => Err(RepoError::Validation(format!("`{field}` must be an HH:MM time"))),
        None => Ok(None),
    }
}

fn attendee_not_found(meeting_id: MeetingId, person_id: PersonId) -> RepoError {
    RepoError::not_found("meeting attendee", format!("{meeting_id}/{person_id}"))
}

pub(crate) fn parse_meeting_row(row: &Row<'_>) -> RepoResult<Meeting> {
    let presenter_name = match row.get::<_, Option<String>>("presenter_first_name")? {
        Some(_) => Some(joined_display_name(row, "presenter_")?),
        None => None,
    };
    Ok(Meeting {
        id: uuid_col(row, "id")?,
        course_id: opt_uuid_col(row, "course_id")?,
        course_number: row.get("course_number")?,
        title: row.get("title")?,
        meeting_date: row.get("meeting_date")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        location: row.get("location")?,
        description: row.get("description")?,
        status: row.get("status")?,
        presenter_id: opt_uuid_col(row, "presenter_id")?,
        presenter_name,
        cme_credits: row.get("cme_credits")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_attendee_row(row: &Row<'_>) -> RepoResult<MeetingAttendee> {
    Ok(MeetingAttendee {
        id: uuid_col(row, "id")?,
        meeting_id: uuid_col(row, "meeting_id")?,
        person_id: uuid_col(row, "person_id")?,
        display_name: joined_display_name(row, "person_")?,
        is_complete: row.get("is_complete")?,
        attended: row.get("attended")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
