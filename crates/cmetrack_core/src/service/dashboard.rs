//! Dashboard snapshot aggregation.
//!
//! # Responsibility
//! - Compute cross-entity counters for the landing view.
//! - Merge recent credit, person and meeting events into one ranked feed.
//!
//! # Invariants
//! - Every read of one snapshot happens inside a single transaction.
//! - Unscoped counters (people, active courses, pending activities,
//!   incomplete profiles) ignore the requested date range.
//! - Without a range, the meeting count covers the ISO week (Monday to
//!   Sunday) containing `today`.
//! - Feed timestamps are `created_at` epoch milliseconds; a range bounds
//!   them by whole UTC days, both ends inclusive.

use super::log_internal_error;
use crate::model::cme::ActivityStatus;
use crate::model::course::CourseStatus;
use crate::model::meeting::{Meeting, MeetingStatus};
use crate::model::person::display_name;
use crate::query::{parse_iso_date, QueryParams};
use crate::repo::meeting_repo::{parse_meeting_row, MEETING_RESOURCE};
use crate::repo::person_repo::joined_display_name;
use crate::repo::support::collect_rows;
use crate::repo::{RepoError, RepoResult};
use chrono::{Datelike, Days, NaiveDate, NaiveTime};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::time::Instant;

const RECENT_MEETINGS_LIMIT: i64 = 4;
const FEED_LIMIT: usize = 4;
const FEED_CREDIT_LIMIT: i64 = 2;
const FEED_PERSON_LIMIT: i64 = 1;
const FEED_MEETING_LIMIT: i64 = 1;

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> RepoResult<Self> {
        if from > to {
            return Err(RepoError::Validation(
                "`from` must not be after `to`".to_string(),
            ));
        }
        Ok(Self { from, to })
    }

    /// Monday through Sunday of the ISO week containing `day`.
    ///
    /// Clamped to the representable calendar at either end.
    pub fn iso_week_of(day: NaiveDate) -> Self {
        let offset = Days::new(u64::from(day.weekday().num_days_from_monday()));
        let monday = day.checked_sub_days(offset).unwrap_or(NaiveDate::MIN);
        Self {
            from: monday,
            to: monday.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX),
        }
    }

    /// `[start of from, start of the day after to)` in UTC epoch milliseconds.
    ///
    /// The upper bound saturates when `to` is the last representable day.
    fn epoch_ms_bounds(&self) -> (i64, i64) {
        let start = self.from.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
        let end = self
            .to
            .succ_opt()
            .map_or(i64::MAX, |next| next.and_time(NaiveTime::MIN).and_utc().timestamp_millis());
        (start, end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardRequest {
    pub today: NaiveDate,
    pub range: Option<DateRange>,
}

impl DashboardRequest {
    pub fn new(today: NaiveDate) -> Self {
        Self { today, range: None }
    }

    pub fn with_range(today: NaiveDate, from: NaiveDate, to: NaiveDate) -> RepoResult<Self> {
        Ok(Self {
            today,
            range: Some(DateRange::new(from, to)?),
        })
    }

    /// Reads optional `from` / `to` ISO dates. A range needs both ends.
    pub fn from_params(params: &QueryParams, today: NaiveDate) -> RepoResult<Self> {
        let from = params.get("from").map(|raw| parse_bound("from", raw)).transpose()?;
        let to = params.get("to").map(|raw| parse_bound("to", raw)).transpose()?;
        match (from, to) {
            (Some(from), Some(to)) => Self::with_range(today, from, to),
            (None, None) => Ok(Self::new(today)),
            _ => Err(RepoError::Validation(
                "a date range needs both `from` and `to`".to_string(),
            )),
        }
    }
}

fn parse_bound(field: &str, raw: &str) -> RepoResult<NaiveDate> {
    parse_iso_date(raw)
        .ok_or_else(|| RepoError::Validation(format!("`{field}` must be a YYYY-MM-DD date")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Credit,
    Person,
    Meeting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityItem {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    pub detail: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub total_people: u64,
    pub active_courses: u64,
    pub meeting_count: u64,
    pub pending_cme_activities: u64,
    pub incomplete_profiles: u64,
    pub recent_meetings: Vec<Meeting>,
    pub recent_activity: Vec<ActivityItem>,
    /// Window the scoped figures were computed over.
    pub window: DateRange,
}

pub struct DashboardService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> DashboardService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn snapshot(&self, request: &DashboardRequest) -> RepoResult<DashboardSnapshot> {
        let started_at = Instant::now();
        match self.snapshot_in_tx(request) {
            Ok(snapshot) => {
                info!(
                    "event=dashboard_snapshot module=service status=ok ranged={} meetings={} feed={} duration_ms={}",
                    request.range.is_some(),
                    snapshot.meeting_count,
                    snapshot.recent_activity.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(snapshot)
            }
            Err(err) => {
                log_internal_error("dashboard_snapshot", &err);
                Err(err)
            }
        }
    }

    fn snapshot_in_tx(&self, request: &DashboardRequest) -> RepoResult<DashboardSnapshot> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let window = request
            .range
            .unwrap_or_else(|| DateRange::iso_week_of(request.today));

        let snapshot = DashboardSnapshot {
            total_people: count(&tx, "SELECT COUNT(*) FROM people;", [])?,
            active_courses: count(
                &tx,
                "SELECT COUNT(*) FROM courses WHERE status = ?1;",
                [text(CourseStatus::Active.as_db())],
            )?,
            meeting_count: count(
                &tx,
                "SELECT COUNT(*) FROM meetings WHERE meeting_date BETWEEN ?1 AND ?2;",
                [date(window.from), date(window.to)],
            )?,
            pending_cme_activities: count(
                &tx,
                "SELECT COUNT(*) FROM cme_activities WHERE status = ?1;",
                [text(ActivityStatus::Pending.as_db())],
            )?,
            incomplete_profiles: count(
                &tx,
                "SELECT COUNT(*) FROM people WHERE is_complete = 0;",
                [],
            )?,
            recent_meetings: recent_meetings(&tx, request.range)?,
            recent_activity: recent_activity(&tx, request.range)?,
            window,
        };
        tx.commit()?;
        Ok(snapshot)
    }
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn date(value: NaiveDate) -> Value {
    Value::Text(value.format("%Y-%m-%d").to_string())
}

fn count<const N: usize>(conn: &Connection, sql: &str, binds: [Value; N]) -> RepoResult<u64> {
    let total: i64 = conn.query_row(sql, params_from_iter(binds.iter()), |row| row.get(0))?;
    Ok(u64::try_from(total).unwrap_or_default())
}

/// Latest meetings by date; limited to the range when one is given.
fn recent_meetings(conn: &Connection, range: Option<DateRange>) -> RepoResult<Vec<Meeting>> {
    let (where_sql, binds) = match range {
        Some(range) => (
            " WHERE m.meeting_date BETWEEN ? AND ?",
            vec![date(range.from), date(range.to)],
        ),
        None => ("", Vec::new()),
    };
    collect_rows(
        conn,
        &format!(
            "SELECT {} {}{where_sql} ORDER BY {} LIMIT {RECENT_MEETINGS_LIMIT};",
            MEETING_RESOURCE.columns_sql, MEETING_RESOURCE.from_sql, MEETING_RESOURCE.order_by
        ),
        params_from_iter(binds.iter()),
        parse_meeting_row,
    )
}

/// Per-source newest events, merged newest first and cut to [`FEED_LIMIT`].
fn recent_activity(conn: &Connection, range: Option<DateRange>) -> RepoResult<Vec<ActivityItem>> {
    let bounds = range.map(|range| range.epoch_ms_bounds());
    let created_between = |column: &str| match bounds {
        Some(_) => format!(" AND {column} >= ? AND {column} < ?"),
        None => String::new(),
    };
    let bound_values = |leading: Vec<Value>| {
        let mut values = leading;
        if let Some((start, end)) = bounds {
            values.push(Value::Integer(start));
            values.push(Value::Integer(end));
        }
        values
    };

    let mut feed = Vec::new();

    let credit_binds = bound_values(Vec::new());
    feed.extend(collect_rows(
        conn,
        &format!(
            "SELECT a.name AS activity_name, a.activity_type, p.title AS person_title,
                    p.first_name AS person_first_name, p.last_name AS person_last_name,
                    cc.created_at
             FROM cme_credits cc
             INNER JOIN cme_activities a ON a.id = cc.activity_id
             INNER JOIN people p ON p.id = cc.person_id
             WHERE cc.verified = 1{}
             ORDER BY cc.created_at DESC, cc.rowid DESC
             LIMIT {FEED_CREDIT_LIMIT};",
            created_between("cc.created_at")
        ),
        params_from_iter(credit_binds.iter()),
        |row| {
            let activity_type: String = row.get("activity_type")?;
            Ok(ActivityItem {
                kind: ActivityKind::Credit,
                title: row.get("activity_name")?,
                detail: format!(
                    "{} | {activity_type} Credits",
                    joined_display_name(row, "person_")?
                ),
                timestamp: row.get("created_at")?,
            })
        },
    )?);

    let person_binds = bound_values(Vec::new());
    feed.extend(collect_rows(
        conn,
        &format!(
            "SELECT title, first_name, last_name, role, created_at
             FROM people
             WHERE 1 = 1{}
             ORDER BY created_at DESC, rowid DESC
             LIMIT {FEED_PERSON_LIMIT};",
            created_between("created_at")
        ),
        params_from_iter(person_binds.iter()),
        |row| {
            let title: Option<String> = row.get("title")?;
            let first_name: String = row.get("first_name")?;
            let last_name: String = row.get("last_name")?;
            let role: String = row.get("role")?;
            Ok(ActivityItem {
                kind: ActivityKind::Person,
                title: "New person added".to_string(),
                detail: format!(
                    "{} | {role}",
                    display_name(title.as_deref(), &first_name, &last_name)
                ),
                timestamp: row.get("created_at")?,
            })
        },
    )?);

    let meeting_binds = bound_values(vec![text(MeetingStatus::Scheduled.as_db())]);
    feed.extend(collect_rows(
        conn,
        &format!(
            "SELECT title, meeting_date, created_at
             FROM meetings
             WHERE status = ?{}
             ORDER BY created_at DESC, rowid DESC
             LIMIT {FEED_MEETING_LIMIT};",
            created_between("created_at")
        ),
        params_from_iter(meeting_binds.iter()),
        |row| {
            let meeting_date: NaiveDate = row.get("meeting_date")?;
            Ok(ActivityItem {
                kind: ActivityKind::Meeting,
                title: row.get("title")?,
                detail: format!("Scheduled for {}", meeting_date.format("%Y-%m-%d")),
                timestamp: row.get("created_at")?,
            })
        },
    )?);

    feed.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
    feed.truncate(FEED_LIMIT);
    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::{DashboardRequest, DateRange};
    use crate::query::{parse_iso_date, QueryParams};
    use crate::repo::ErrorKind;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn iso_week_runs_monday_to_sunday() {
        // 2025-03-05 is a Wednesday.
        let week = DateRange::iso_week_of(day(2025, 3, 5));
        assert_eq!(week.from, day(2025, 3, 3));
        assert_eq!(week.to, day(2025, 3, 9));

        let sunday = DateRange::iso_week_of(day(2025, 3, 9));
        assert_eq!(sunday.from, day(2025, 3, 3));
    }

    #[test]
    fn request_requires_both_range_ends() {
        let today = day(2025, 3, 5);
        let params = QueryParams::new().with("from", "2025-03-01");
        let err = DashboardRequest::from_params(&params, today).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let none = DashboardRequest::from_params(&QueryParams::new(), today).unwrap();
        assert!(none.range.is_none());
    }

    #[test]
    fn request_rejects_inverted_range() {
        let params = QueryParams::new()
            .with("from", "2025-03-07")
            .with("to", "2025-03-01");
        let err = DashboardRequest::from_params(&params, day(2025, 3, 5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn range_bounds_cover_whole_days() {
        let range = DateRange::new(day(1970, 1, 1), day(1970, 1, 1)).unwrap();
        assert_eq!(range.epoch_ms_bounds(), (0, 86_400_000));
    }

    #[test]
    fn request_rejects_years_outside_four_digits() {
        let params = QueryParams::new()
            .with("from", "2025-01-01")
            .with("to", "+262142-12-31");
        let err = DashboardRequest::from_params(&params, day(2025, 3, 5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn calendar_edges_do_not_overflow() {
        let range = DateRange::new(day(2025, 1, 1), NaiveDate::MAX).unwrap();
        assert_eq!(range.epoch_ms_bounds().1, i64::MAX);

        let last_week = DateRange::iso_week_of(NaiveDate::MAX);
        assert_eq!(last_week.to, NaiveDate::MAX);
        let first_week = DateRange::iso_week_of(NaiveDate::MIN);
        assert_eq!(first_week.from, NaiveDate::MIN);
    }
}
