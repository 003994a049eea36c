//! Person model and display-name derivation.
//!
//! # Invariants
//! - `display_name` is always derived by [`display_name`], never stored.
//! - `is_complete=false` marks quick-added records awaiting a full profile.

use super::cme::CmeCredit;
use super::credential::IssuedCredential;
use super::course::{AttendeeRole, EnrollmentStatus};
use super::db_enum;
use super::meeting::MeetingStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PersonId = Uuid;

db_enum! {
    /// Program role of a person.
    pub enum PersonRole {
        Faculty => "FACULTY",
        Resident => "RESIDENT",
        Staff => "STAFF",
        Other => "OTHER",
    }
}

db_enum! {
    /// Availability of a person.
    pub enum PersonStatus {
        Active => "ACTIVE",
        Offsite => "OFFSITE",
        Leave => "LEAVE",
        Inactive => "INACTIVE",
    }
}

/// Builds the human-readable name shown across every listing.
///
/// `title first last` when a title is present, otherwise `first last`;
/// surrounding and doubled blanks from empty parts are removed.
pub fn display_name(title: Option<&str>, first_name: &str, last_name: &str) -> String {
    let title = title.map(str::trim).unwrap_or_default();
    [title, first_name.trim(), last_name.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical person read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub title: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub role: PersonRole,
    pub department: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: PersonStatus,
    pub is_complete: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Compact person reference used inside hydrated parents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub id: PersonId,
    pub display_name: String,
    pub role: PersonRole,
    pub email: Option<String>,
}

/// Create payload for a full person record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPerson {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: Option<PersonRole>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<PersonStatus>,
    /// Defaults to `true` for direct creation.
    #[serde(default)]
    pub is_complete: Option<bool>,
}

impl NewPerson {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }
}

/// One course enrollment seen from the person side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonEnrollment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub course_number: String,
    pub course_name: String,
    pub role: AttendeeRole,
    pub status: EnrollmentStatus,
    pub created_at: i64,
}

/// One meeting attendance row seen from the person side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonMeetingAttendance {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub meeting_title: String,
    pub meeting_date: NaiveDate,
    pub meeting_status: MeetingStatus,
    pub attended: bool,
}

/// Person detail with every dependent collection hydrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonDetail {
    #[serde(flatten)]
    pub person: Person,
    pub enrollments: Vec<PersonEnrollment>,
    pub meetings: Vec<PersonMeetingAttendance>,
    pub cme_credits: Vec<CmeCredit>,
    pub credentials: Vec<IssuedCredential>,
}
