//! Meeting and meeting attendance models.
//!
//! # Invariants
//! - A `SCHEDULED` flag on a past-dated meeting is stale; listing treats the
//!   meeting as completed (see `repo::meeting_repo`).

use super::course::{CourseId, CourseSummary};
use super::db_enum;
use super::person::{PersonId, PersonSummary};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MeetingId = Uuid;

db_enum! {
    pub enum MeetingStatus {
        Scheduled => "SCHEDULED",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub course_id: Option<CourseId>,
    pub course_number: Option<String>,
    pub title: String,
    pub meeting_date: NaiveDate,
    /// `HH:MM`, 24h clock.
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: MeetingStatus,
    pub presenter_id: Option<PersonId>,
    pub presenter_name: Option<String>,
    pub cme_credits: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMeeting {
    #[serde(default)]
    pub course_id: Option<CourseId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub meeting_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<MeetingStatus>,
    #[serde(default)]
    pub presenter_id: Option<PersonId>,
    #[serde(default)]
    pub cme_credits: Option<f64>,
}

impl NewMeeting {
    pub fn new(title: impl Into<String>, meeting_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            meeting_date: Some(meeting_date),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingAttendee {
    pub id: Uuid,
    pub meeting_id: MeetingId,
    pub person_id: PersonId,
    pub display_name: String,
    pub is_complete: bool,
    pub attended: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingDetail {
    #[serde(flatten)]
    pub meeting: Meeting,
    pub course: Option<CourseSummary>,
    pub presenter: Option<PersonSummary>,
    pub attendees: Vec<MeetingAttendee>,
}
