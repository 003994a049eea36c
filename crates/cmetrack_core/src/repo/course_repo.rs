//! Course and enrollment repository.
//!
//! # Responsibility
//! - CRUD over `courses`, including the five optional person role slots.
//! - Enrollment (`course_attendees`) add/update/remove/list.
//! - Hydrate course detail with role people, attendees and meetings.
//!
//! # Invariants
//! - `course_number` is globally unique; duplicates surface as `Conflict`.
//! - One enrollment row per (course, person) pair.

use super::meeting_repo::{parse_meeting_row, MEETING_RESOURCE};
use super::person_repo::{find_summary, joined_display_name};
use super::support::{
    collect_rows, count_col, delete_by_id, ensure_exists, ensure_ordered, fetch_page, first_row,
    map_constraint, now_ms, opt_uuid_col, optional_text, require_text, uuid_col,
};
use super::{RepoError, RepoResult, ResourceRepository};
use crate::model::course::{
    AttendeeRole, Course, CourseAttendee, CourseDetail, CourseId, CourseRoles, CourseStatus,
    EnrollmentStatus, NewCourse,
};
use crate::model::meeting::Meeting;
use crate::model::page::{Deleted, Page};
use crate::model::person::PersonId;
use crate::query::{
    build_patch, ColumnKind, FilterColumn, FilterKind, PageRequest, Predicate, QueryParams,
    ResourceDescriptor, UpdatableColumn,
};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

const DUPLICATE_COURSE_NUMBER: &str = "course number already exists";
const DUPLICATE_ENROLLMENT: &str = "person is already enrolled in this course";
const COURSE_DATES_REVERSED: &str = "`end_date` cannot be before `start_date`";

pub const COURSE_RESOURCE: ResourceDescriptor = ResourceDescriptor {
    resource: "course",
    table: "courses",
    columns_sql: "c.id, c.course_number, c.name, c.description, c.start_date, c.end_date,
        c.status, c.chair_id, c.moderator1_id, c.moderator2_id, c.organizer_id, c.admin_id,
        (SELECT COUNT(*) FROM course_attendees ca WHERE ca.course_id = c.id) AS attendee_count,
        c.created_at, c.updated_at",
    from_sql: "FROM courses c",
    filters: &[FilterColumn::new("status", "c.status", FilterKind::Status)],
    search_columns: &["c.course_number", "c.name"],
    order_by: "c.created_at DESC, c.rowid DESC",
    updatable: &[
        UpdatableColumn::required("course_number", ColumnKind::Text),
        UpdatableColumn::required("name", ColumnKind::Text),
        UpdatableColumn::optional("description", ColumnKind::Text),
        UpdatableColumn::optional("start_date", ColumnKind::Date),
        UpdatableColumn::optional("end_date", ColumnKind::Date),
        UpdatableColumn::required("status", ColumnKind::Enum(CourseStatus::VALUES)),
        UpdatableColumn::optional("chair_id", ColumnKind::Reference),
        UpdatableColumn::optional("moderator1_id", ColumnKind::Reference),
        UpdatableColumn::optional("moderator2_id", ColumnKind::Reference),
        UpdatableColumn::optional("organizer_id", ColumnKind::Reference),
        UpdatableColumn::optional("admin_id", ColumnKind::Reference),
    ],
};

pub const COURSE_ATTENDEE_RESOURCE: ResourceDescriptor = ResourceDescriptor {
    resource: "course attendee",
    table: "course_attendees",
    columns_sql: "ca.id, ca.course_id, ca.person_id, p.title AS person_title,
        p.first_name AS person_first_name, p.last_name AS person_last_name, p.email,
        p.is_complete, ca.role, ca.status, ca.created_at, ca.updated_at",
    from_sql: "FROM course_attendees ca INNER JOIN people p ON p.id = ca.person_id",
    filters: &[
        FilterColumn::new("role", "ca.role", FilterKind::Status),
        FilterColumn::new("status", "ca.status", FilterKind::Status),
    ],
    search_columns: &["p.first_name", "p.last_name", "p.email"],
    order_by: "p.last_name COLLATE NOCASE ASC, p.first_name COLLATE NOCASE ASC, ca.id ASC",
    updatable: &[
        UpdatableColumn::required("role", ColumnKind::Enum(AttendeeRole::VALUES)),
        UpdatableColumn::required("status", ColumnKind::Enum(EnrollmentStatus::VALUES)),
    ],
};

/// SQLite-backed course repository.
pub struct SqliteCourseRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCourseRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn find(&self, id: CourseId) -> RepoResult<Option<Course>> {
        first_row(
            self.conn,
            &format!(
                "SELECT {} {} WHERE c.id = ?1;",
                COURSE_RESOURCE.columns_sql, COURSE_RESOURCE.from_sql
            ),
            [id.to_string()],
            parse_course_row,
        )
    }

    fn require(&self, id: CourseId) -> RepoResult<Course> {
        self.find(id)?
            .ok_or_else(|| RepoError::not_found(COURSE_RESOURCE.resource, id))
    }

    /// Enrolls an existing person.
    ///
    /// # Errors
    /// - `NotFound` when the course or person does not exist.
    /// - `Conflict` when the person is already enrolled.
    pub fn add_attendee(
        &self,
        course_id: CourseId,
        person_id: PersonId,
        role: AttendeeRole,
    ) -> RepoResult<CourseAttendee> {
        ensure_exists(self.conn, "courses", COURSE_RESOURCE.resource, course_id)?;
        ensure_exists(self.conn, "people", "person", person_id)?;

        let now = now_ms();
        self.conn
            .execute(
                "INSERT INTO course_attendees (
                    id, course_id, person_id, role, status, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6);",
                params![
                    Uuid::new_v4().to_string(),
                    course_id.to_string(),
                    person_id.to_string(),
                    role,
                    EnrollmentStatus::Enrolled,
                    now,
                ],
            )
            .map_err(|err| map_constraint(err, DUPLICATE_ENROLLMENT))?;

        info!("event=course_attendee_add module=repo status=ok course_id={course_id} person_id={person_id}");
        self.require_attendee(course_id, person_id)
    }

    /// Rewrites `role` and/or `status` of one enrollment.
    pub fn update_attendee(
        &self,
        course_id: CourseId,
        person_id: PersonId,
        patch: &Map<String, JsonValue>,
    ) -> RepoResult<CourseAttendee> {
        let patch = build_patch(&COURSE_ATTENDEE_RESOURCE, patch)?;
        let (sql, binds) = patch.into_update(
            COURSE_ATTENDEE_RESOURCE.table,
            "course_id = ? AND person_id = ?",
            [
                Value::Text(course_id.to_string()),
                Value::Text(person_id.to_string()),
            ],
            now_ms(),
        );
        let changed = self.conn.execute(&sql, params_from_iter(binds.iter()))?;
        if changed == 0 {
            return Err(attendee_not_found(course_id, person_id));
        }
        self.require_attendee(course_id, person_id)
    }

    pub fn remove_attendee(&self, course_id: CourseId, person_id: PersonId) -> RepoResult<Deleted> {
        let changed = self.conn.execute(
            "DELETE FROM course_attendees WHERE course_id = ?1 AND person_id = ?2;",
            [course_id.to_string(), person_id.to_string()],
        )?;
        if changed == 0 {
            return Err(attendee_not_found(course_id, person_id));
        }
        Ok(Deleted::YES)
    }

    /// Lists the enrollments of one course, ordered by attendee name.
    ///
    /// `params` accepts the `role`, `status` and `search` filters.
    pub fn list_attendees(
        &self,
        course_id: CourseId,
        params: &QueryParams,
    ) -> RepoResult<Vec<CourseAttendee>> {
        let mut predicate = Predicate::from_params(&COURSE_ATTENDEE_RESOURCE, params);
        predicate.push("ca.course_id = ?", [Value::Text(course_id.to_string())]);
        collect_rows(
            self.conn,
            &format!(
                "SELECT {} {}{} ORDER BY {};",
                COURSE_ATTENDEE_RESOURCE.columns_sql,
                COURSE_ATTENDEE_RESOURCE.from_sql,
                predicate.where_sql(),
                COURSE_ATTENDEE_RESOURCE.order_by
            ),
            params_from_iter(predicate.binds().iter()),
            parse_attendee_row,
        )
    }

    fn require_attendee(&self, course_id: CourseId, person_id: PersonId) -> RepoResult<CourseAttendee> {
        first_row(
            self.conn,
            &format!(
                "SELECT {} {} WHERE ca.course_id = ?1 AND ca.person_id = ?2;",
                COURSE_ATTENDEE_RESOURCE.columns_sql, COURSE_ATTENDEE_RESOURCE.from_sql
            ),
            [course_id.to_string(), person_id.to_string()],
            parse_attendee_row,
        )?
        .ok_or_else(|| attendee_not_found(course_id, person_id))
    }

    fn load_roles(&self, course: &Course) -> RepoResult<CourseRoles> {
        let summary = |id: Option<PersonId>| match id {
            Some(id) => find_summary(self.conn, id),
            None => Ok(None),
        };
        Ok(CourseRoles {
            chair: summary(course.chair_id)?,
            moderator1: summary(course.moderator1_id)?,
            moderator2: summary(course.moderator2_id)?,
            organizer: summary(course.organizer_id)?,
            admin: summary(course.admin_id)?,
        })
    }

    fn list_meetings(&self, course_id: CourseId) -> RepoResult<Vec<Meeting>> {
        collect_rows(
            self.conn,
            &format!(
                "SELECT {} {} WHERE m.course_id = ?1
                 ORDER BY m.meeting_date ASC, m.start_time ASC, m.id ASC;",
                MEETING_RESOURCE.columns_sql, MEETING_RESOURCE.from_sql
            ),
            [course_id.to_string()],
            parse_meeting_row,
        )
    }
}

impl ResourceRepository for SqliteCourseRepository<'_> {
    type Record = Course;
    type Detail = CourseDetail;
    type Draft = NewCourse;

    fn list(&self, params: &QueryParams, page: PageRequest) -> RepoResult<Page<Course>> {
        let predicate = Predicate::from_params(&COURSE_RESOURCE, params);
        fetch_page(
            self.conn,
            &COURSE_RESOURCE,
            &predicate,
            COURSE_RESOURCE.order_by,
            page,
            parse_course_row,
        )
    }

    fn get(&self, id: CourseId) -> RepoResult<CourseDetail> {
        let course = self.require(id)?;
        Ok(CourseDetail {
            roles: self.load_roles(&course)?,
            attendees: self.list_attendees(id, &QueryParams::new())?,
            meetings: self.list_meetings(id)?,
            course,
        })
    }

    fn create(&self, draft: &NewCourse) -> RepoResult<Course> {
        let course_number = require_text("course_number", &draft.course_number)?;
        let name = require_text("name", &draft.name)?;
        ensure_ordered(
            draft.start_date.as_ref(),
            draft.end_date.as_ref(),
            COURSE_DATES_REVERSED,
        )?;

        let id = Uuid::new_v4();
        let now = now_ms();
        self.conn
            .execute(
                "INSERT INTO courses (
                    id, course_number, name, description, start_date, end_date, status,
                    chair_id, moderator1_id, moderator2_id, organizer_id, admin_id,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13);",
                params![
                    id.to_string(),
                    course_number,
                    name,
                    optional_text(draft.description.as_deref()),
                    draft.start_date,
                    draft.end_date,
                    draft.status.unwrap_or(CourseStatus::Draft),
                    draft.chair_id.map(|id| id.to_string()),
                    draft.moderator1_id.map(|id| id.to_string()),
                    draft.moderator2_id.map(|id| id.to_string()),
                    draft.organizer_id.map(|id| id.to_string()),
                    draft.admin_id.map(|id| id.to_string()),
                    now,
                ],
            )
            .map_err(|err| map_constraint(err, DUPLICATE_COURSE_NUMBER))?;
        self.require(id)
    }

    fn update(&self, id: CourseId, patch: &Map<String, JsonValue>) -> RepoResult<Course> {
        let patch = build_patch(&COURSE_RESOURCE, patch)?;
        if patch.touches("start_date") || patch.touches("end_date") {
            let current = self.require(id)?;
            ensure_ordered(
                patch.merged("start_date", current.start_date).as_ref(),
                patch.merged("end_date", current.end_date).as_ref(),
                COURSE_DATES_REVERSED,
            )?;
        }
        let (sql, binds) = patch.into_update(
            COURSE_RESOURCE.table,
            "id = ?",
            [Value::Text(id.to_string())],
            now_ms(),
        );
        let changed = self
            .conn
            .execute(&sql, params_from_iter(binds.iter()))
            .map_err(|err| map_constraint(err, DUPLICATE_COURSE_NUMBER))?;
        if changed == 0 {
            return Err(RepoError::not_found(COURSE_RESOURCE.resource, id));
        }
        self.require(id)
    }

    fn delete(&self, id: CourseId) -> RepoResult<Deleted> {
        delete_by_id(self.conn, COURSE_RESOURCE.table, COURSE_RESOURCE.resource, id)
    }
}

fn attendee_not_found(course_id: CourseId, person_id: PersonId) -> RepoError {
    RepoError::not_found(
        COURSE_ATTENDEE_RESOURCE.resource,
        format!("{course_id}/{person_id}"),
    )
}

fn parse_course_row(row: &Row<'_>) -> RepoResult<Course> {
    Ok(Course {
        id: uuid_col(row, "id")?,
        course_number: row.get("course_number")?,
        name: row.get("name")?,
        description: row.get("description")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        status: row.get("status")?,
        chair_id: opt_uuid_col(row, "chair_id")?,
        moderator1_id: opt_uuid_col(row, "moderator1_id")?,
        moderator2_id: opt_uuid_col(row, "moderator2_id")?,
        organizer_id: opt_uuid_col(row, "organizer_id")?,
        admin_id: opt_uuid_col(row, "admin_id")?,
        attendee_count: count_col(row, "attendee_count")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_attendee_row(row: &Row<'_>) -> RepoResult<CourseAttendee> {
    Ok(CourseAttendee {
        id: uuid_col(row, "id")?,
        course_id: uuid_col(row, "course_id")?,
        person_id: uuid_col(row, "person_id")?,
        display_name: joined_display_name(row, "person_")?,
        email: row.get("email")?,
        is_complete: row.get("is_complete")?,
        role: row.get("role")?,
        status: row.get("status")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
