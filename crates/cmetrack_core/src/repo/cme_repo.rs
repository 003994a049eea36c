//! CME activity and credit repository.
//!
//! # Responsibility
//! - CRUD over `cme_activities`.
//! - Award, verify, remove and list `cme_credits` rows.
//!
//! # Invariants
//! - One credit row per (activity, person) pair.
//! - An award without explicit credits copies the activity's credit value.

use super::person_repo::joined_display_name;
use super::support::{
    collect_rows, count_col, delete_by_id, ensure_exists, fetch_page, first_row, map_constraint,
    now_ms, optional_text, require_text, uuid_col,
};
use super::{RepoError, RepoResult, ResourceRepository};
use crate::model::cme::{
    ActivityId, ActivityStatus, AwardCredit, CmeActivity, CmeActivityDetail, CmeCredit, CreditId,
    NewCmeActivity,
};
use crate::model::page::{Deleted, Page};
use crate::model::person::PersonId;
use crate::query::{
    build_patch, ColumnKind, FilterColumn, FilterKind, PageRequest, Predicate, QueryParams,
    ResourceDescriptor, UpdatableColumn,
};
use chrono::Local;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

const DUPLICATE_CREDIT: &str = "person has already been awarded credit for this activity";
const DUPLICATE_ACTIVITY_ID: &str = "cme activity id already exists";

pub const CME_ACTIVITY_RESOURCE: ResourceDescriptor = ResourceDescriptor {
    resource: "cme activity",
    table: "cme_activities",
    columns_sql: "a.id, a.name, a.provider, a.activity_type, a.credits, a.activity_date,
        a.description, a.status,
        (SELECT COUNT(*) FROM cme_credits cc WHERE cc.activity_id = a.id) AS awarded_count,
        a.created_at, a.updated_at",
    from_sql: "FROM cme_activities a",
    filters: &[
        FilterColumn::new("status", "a.status", FilterKind::Status),
        FilterColumn::new("activity_type", "a.activity_type", FilterKind::Exact),
        FilterColumn::new("provider", "a.provider", FilterKind::Exact),
    ],
    search_columns: &["a.name", "a.provider"],
    order_by: "a.created_at DESC, a.rowid DESC",
    updatable: &[
        UpdatableColumn::required("name", ColumnKind::Text),
        UpdatableColumn::optional("provider", ColumnKind::Text),
        UpdatableColumn::required("activity_type", ColumnKind::Text),
        UpdatableColumn::required("credits", ColumnKind::Real),
        UpdatableColumn::optional("activity_date", ColumnKind::Date),
        UpdatableColumn::optional("description", ColumnKind::Text),
        UpdatableColumn::required("status", ColumnKind::Enum(ActivityStatus::VALUES)),
    ],
};

pub const CME_CREDIT_RESOURCE: ResourceDescriptor = ResourceDescriptor {
    resource: "cme credit",
    table: "cme_credits",
    columns_sql: "cc.id, cc.activity_id, cc.person_id, p.title AS person_title,
        p.first_name AS person_first_name, p.last_name AS person_last_name,
        a.name AS activity_name, a.activity_type, cc.credits_earned, cc.date_earned,
        cc.verified, cc.created_at, cc.updated_at",
    from_sql: "FROM cme_credits cc
        INNER JOIN people p ON p.id = cc.person_id
        INNER JOIN cme_activities a ON a.id = cc.activity_id",
    filters: &[
        FilterColumn::new("person_id", "cc.person_id", FilterKind::Exact),
        FilterColumn::new("activity_id", "cc.activity_id", FilterKind::Exact),
        FilterColumn::new("verified", "cc.verified", FilterKind::Bool),
        FilterColumn::new("from", "cc.date_earned", FilterKind::DateFrom),
        FilterColumn::new("to", "cc.date_earned", FilterKind::DateTo),
    ],
    search_columns: &["a.name", "p.first_name", "p.last_name"],
    order_by: "cc.date_earned DESC, cc.created_at DESC, cc.id ASC",
    updatable: &[],
};

/// SQLite-backed CME activity repository; credits hang off activities.
pub struct SqliteCmeActivityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCmeActivityRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn find(&self, id: ActivityId) -> RepoResult<Option<CmeActivity>> {
        first_row(
            self.conn,
            &format!(
                "SELECT {} {} WHERE a.id = ?1;",
                CME_ACTIVITY_RESOURCE.columns_sql, CME_ACTIVITY_RESOURCE.from_sql
            ),
            [id.to_string()],
            parse_activity_row,
        )
    }

    fn require(&self, id: ActivityId) -> RepoResult<CmeActivity> {
        self.find(id)?
            .ok_or_else(|| RepoError::not_found(CME_ACTIVITY_RESOURCE.resource, id))
    }

    /// Awards credit for an activity to one person.
    ///
    /// Missing `credits_earned` falls back to the activity's credits and a
    /// missing `date_earned` to the local calendar day.
    ///
    /// # Errors
    /// - `NotFound` when the activity or person does not exist.
    /// - `Conflict` when the person already holds credit for this activity.
    /// - `Validation` for negative or non-finite credit values.
    pub fn award_credit(&self, activity_id: ActivityId, award: &AwardCredit) -> RepoResult<CmeCredit> {
        let activity = self.require(activity_id)?;
        ensure_exists(self.conn, "people", "person", award.person_id)?;

        let credits_earned = award.credits_earned.unwrap_or(activity.credits);
        validate_credits("credits_earned", credits_earned)?;
        let date_earned = award
            .date_earned
            .unwrap_or_else(|| Local::now().date_naive());

        let id = Uuid::new_v4();
        let now = now_ms();
        self.conn
            .execute(
                "INSERT INTO cme_credits (
                    id, activity_id, person_id, credits_earned, date_earned, verified,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7);",
                params![
                    id.to_string(),
                    activity_id.to_string(),
                    award.person_id.to_string(),
                    credits_earned,
                    date_earned,
                    award.verified.unwrap_or(false),
                    now,
                ],
            )
            .map_err(|err| map_constraint(err, DUPLICATE_CREDIT))?;
        self.require_credit(id)
    }

    pub fn verify_credit(&self, credit_id: CreditId, verified: bool) -> RepoResult<CmeCredit> {
        let changed = self.conn.execute(
            "UPDATE cme_credits SET verified = ?2, updated_at = ?3 WHERE id = ?1;",
            params![credit_id.to_string(), verified, now_ms()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(CME_CREDIT_RESOURCE.resource, credit_id));
        }
        self.require_credit(credit_id)
    }

    pub fn remove_credit(&self, credit_id: CreditId) -> RepoResult<Deleted> {
        delete_by_id(
            self.conn,
            CME_CREDIT_RESOURCE.table,
            CME_CREDIT_RESOURCE.resource,
            credit_id,
        )
    }

    /// Lists credits across activities, filtered by `person_id`, `activity_id`,
    /// `verified` and `from`/`to` on the earned date.
    pub fn list_credits(&self, params: &QueryParams, page: PageRequest) -> RepoResult<Page<CmeCredit>> {
        let predicate = Predicate::from_params(&CME_CREDIT_RESOURCE, params);
        fetch_page(
            self.conn,
            &CME_CREDIT_RESOURCE,
            &predicate,
            CME_CREDIT_RESOURCE.order_by,
            page,
            parse_credit_row,
        )
    }

    fn require_credit(&self, credit_id: CreditId) -> RepoResult<CmeCredit> {
        first_row(
            self.conn,
            &format!(
                "SELECT {} {} WHERE cc.id = ?1;",
                CME_CREDIT_RESOURCE.columns_sql, CME_CREDIT_RESOURCE.from_sql
            ),
            [credit_id.to_string()],
            parse_credit_row,
        )?
        .ok_or_else(|| RepoError::not_found(CME_CREDIT_RESOURCE.resource, credit_id))
    }

    fn credits_for_activity(&self, activity_id: ActivityId) -> RepoResult<Vec<CmeCredit>> {
        collect_rows(
            self.conn,
            &format!(
                "SELECT {} {} WHERE cc.activity_id = ?1
                 ORDER BY p.last_name COLLATE NOCASE ASC, p.first_name COLLATE NOCASE ASC, cc.id ASC;",
                CME_CREDIT_RESOURCE.columns_sql, CME_CREDIT_RESOURCE.from_sql
            ),
            [activity_id.to_string()],
            parse_credit_row,
        )
    }
}

impl ResourceRepository for SqliteCmeActivityRepository<'_> {
    type Record = CmeActivity;
    type Detail = CmeActivityDetail;
    type Draft = NewCmeActivity;

    fn list(&self, params: &QueryParams, page: PageRequest) -> RepoResult<Page<CmeActivity>> {
        let predicate = Predicate::from_params(&CME_ACTIVITY_RESOURCE, params);
        fetch_page(
            self.conn,
            &CME_ACTIVITY_RESOURCE,
            &predicate,
            CME_ACTIVITY_RESOURCE.order_by,
            page,
            parse_activity_row,
        )
    }

    fn get(&self, id: ActivityId) -> RepoResult<CmeActivityDetail> {
        let activity = self.require(id)?;
        Ok(CmeActivityDetail {
            credits: self.credits_for_activity(id)?,
            activity,
        })
    }

    fn create(&self, draft: &NewCmeActivity) -> RepoResult<CmeActivity> {
        let name = require_text("name", &draft.name)?;
        let activity_type = require_text("activity_type", &draft.activity_type)?;
        let credits = draft.credits.unwrap_or(0.0);
        validate_credits("credits", credits)?;

        let id = Uuid::new_v4();
        let now = now_ms();
        self.conn
            .execute(
                "INSERT INTO cme_activities (
                    id, name, provider, activity_type, credits, activity_date, description,
                    status, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9);",
                params![
                    id.to_string(),
                    name,
                    optional_text(draft.provider.as_deref()),
                    activity_type,
                    credits,
                    draft.activity_date,
                    optional_text(draft.description.as_deref()),
                    draft.status.unwrap_or(ActivityStatus::Pending),
                    now,
                ],
            )
            .map_err(|err| map_constraint(err, DUPLICATE_ACTIVITY_ID))?;
        self.require(id)
    }

    fn update(&self, id: ActivityId, patch: &Map<String, JsonValue>) -> RepoResult<CmeActivity> {
        let patch = build_patch(&CME_ACTIVITY_RESOURCE, patch)?;
        let (sql, binds) = patch.into_update(
            CME_ACTIVITY_RESOURCE.table,
            "id = ?",
            [Value::Text(id.to_string())],
            now_ms(),
        );
        let changed = self
            .conn
            .execute(&sql, params_from_iter(binds.iter()))
            .map_err(|err| map_constraint(err, DUPLICATE_ACTIVITY_ID))?;
        if changed == 0 {
            return Err(RepoError::not_found(CME_ACTIVITY_RESOURCE.resource, id));
        }
        self.require(id)
    }

    fn delete(&self, id: ActivityId) -> RepoResult<Deleted> {
        delete_by_id(
            self.conn,
            CME_ACTIVITY_RESOURCE.table,
            CME_ACTIVITY_RESOURCE.resource,
            id,
        )
    }
}

/// Credits held by one person, most recently earned first.
pub(crate) fn list_credits_for_person(conn: &Connection, person_id: PersonId) -> RepoResult<Vec<CmeCredit>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {} {} WHERE cc.person_id = ?1 ORDER BY {};",
            CME_CREDIT_RESOURCE.columns_sql,
            CME_CREDIT_RESOURCE.from_sql,
            CME_CREDIT_RESOURCE.order_by
        ),
        [person_id.to_string()],
        parse_credit_row,
    )
}

fn validate_credits(field: &str, value: f64) -> RepoResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(RepoError::Validation(format!(
            "`{field}` must be a non-negative number"
        )));
    }
    Ok(())
}

fn parse_activity_row(row: &Row<'_>) -> RepoResult<CmeActivity> {
    Ok(CmeActivity {
        id: uuid_col(row, "id")?,
        name: row.get("name")?,
        provider: row.get("provider")?,
        activity_type: row.get("activity_type")?,
        credits: row.get("credits")?,
        activity_date: row.get("activity_date")?,
        description: row.get("description")?,
        status: row.get("status")?,
        awarded_count: count_col(row, "awarded_count")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_credit_row(row: &Row<'_>) -> RepoResult<CmeCredit> {
    Ok(CmeCredit {
        id: uuid_col(row, "id")?,
        activity_id: uuid_col(row, "activity_id")?,
        person_id: uuid_col(row, "person_id")?,
        display_name: joined_display_name(row, "person_")?,
        activity_name: row.get("activity_name")?,
        activity_type: row.get("activity_type")?,
        credits_earned: row.get("credits_earned")?,
        date_earned: row.get("date_earned")?,
        verified: row.get("verified")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
