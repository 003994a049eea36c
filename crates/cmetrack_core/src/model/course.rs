//! Course and enrollment models.

use super::db_enum;
use super::meeting::Meeting;
use super::person::{PersonId, PersonSummary};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CourseId = Uuid;

db_enum! {
    /// Course lifecycle.
    pub enum CourseStatus {
        Draft => "DRAFT",
        Active => "ACTIVE",
        Archived => "ARCHIVED",
    }
}

db_enum! {
    /// Role of a person inside one course.
    pub enum AttendeeRole {
        Attendee => "ATTENDEE",
        Instructor => "INSTRUCTOR",
    }
}

db_enum! {
    /// Enrollment progress of one course attendee.
    pub enum EnrollmentStatus {
        Enrolled => "ENROLLED",
        Completed => "COMPLETED",
        Withdrawn => "WITHDRAWN",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub course_number: String,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: CourseStatus,
    pub chair_id: Option<PersonId>,
    pub moderator1_id: Option<PersonId>,
    pub moderator2_id: Option<PersonId>,
    pub organizer_id: Option<PersonId>,
    pub admin_id: Option<PersonId>,
    /// Number of enrollment rows, computed at read time.
    pub attendee_count: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Compact course reference used by meeting detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub id: CourseId,
    pub course_number: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCourse {
    #[serde(default)]
    pub course_number: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<CourseStatus>,
    #[serde(default)]
    pub chair_id: Option<PersonId>,
    #[serde(default)]
    pub moderator1_id: Option<PersonId>,
    #[serde(default)]
    pub moderator2_id: Option<PersonId>,
    #[serde(default)]
    pub organizer_id: Option<PersonId>,
    #[serde(default)]
    pub admin_id: Option<PersonId>,
}

impl NewCourse {
    pub fn new(course_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            course_number: course_number.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Enrollment join row with the attendee's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAttendee {
    pub id: Uuid,
    pub course_id: CourseId,
    pub person_id: PersonId,
    pub display_name: String,
    pub email: Option<String>,
    pub is_complete: bool,
    pub role: AttendeeRole,
    pub status: EnrollmentStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The five optional people a course references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRoles {
    pub chair: Option<PersonSummary>,
    pub moderator1: Option<PersonSummary>,
    pub moderator2: Option<PersonSummary>,
    pub organizer: Option<PersonSummary>,
    pub admin: Option<PersonSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub roles: CourseRoles,
    pub attendees: Vec<CourseAttendee>,
    pub meetings: Vec<Meeting>,
}
