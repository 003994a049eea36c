//! Continuing-education activity and credit models.

use super::db_enum;
use super::person::PersonId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ActivityId = Uuid;
pub type CreditId = Uuid;

db_enum! {
    /// Review state of an activity.
    pub enum ActivityStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmeActivity {
    pub id: ActivityId,
    pub name: String,
    pub provider: Option<String>,
    pub activity_type: String,
    /// Total credit value offered by the activity.
    pub credits: f64,
    pub activity_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub status: ActivityStatus,
    /// Number of credit rows awarded, computed at read time.
    pub awarded_count: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCmeActivity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub activity_type: String,
    #[serde(default)]
    pub credits: Option<f64>,
    #[serde(default)]
    pub activity_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ActivityStatus>,
}

impl NewCmeActivity {
    pub fn new(name: impl Into<String>, activity_type: impl Into<String>, credits: f64) -> Self {
        Self {
            name: name.into(),
            activity_type: activity_type.into(),
            credits: Some(credits),
            ..Self::default()
        }
    }
}

/// Credit join row with denormalized person and activity labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmeCredit {
    pub id: CreditId,
    pub activity_id: ActivityId,
    pub person_id: PersonId,
    pub display_name: String,
    pub activity_name: String,
    pub activity_type: String,
    pub credits_earned: f64,
    pub date_earned: NaiveDate,
    pub verified: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Award request for one person on one activity.
///
/// Missing `credits_earned` falls back to the activity's credit value and a
/// missing `date_earned` to the award day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardCredit {
    pub person_id: PersonId,
    #[serde(default)]
    pub credits_earned: Option<f64>,
    #[serde(default)]
    pub date_earned: Option<NaiveDate>,
    #[serde(default)]
    pub verified: Option<bool>,
}

impl AwardCredit {
    pub fn new(person_id: PersonId) -> Self {
        Self {
            person_id,
            credits_earned: None,
            date_earned: None,
            verified: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmeActivityDetail {
    #[serde(flatten)]
    pub activity: CmeActivity,
    pub credits: Vec<CmeCredit>,
}
