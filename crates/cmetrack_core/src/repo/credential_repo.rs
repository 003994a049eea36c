//! Credential template and issued credential repository.
//!
//! # Responsibility
//! - CRUD over `credential_templates` with JSON field placements.
//! - Issue credentials with generated human-readable numbers.
//! - Expire lapsed credentials in bulk.
//!
//! # Invariants
//! - `credential_number` is globally unique (`CRED-YYYY-XXXXXXXX`).
//! - Expiry only moves `ACTIVE` rows to `EXPIRED`, never back.

use super::person_repo::joined_display_name;
use super::support::{
    collect_rows, count_col, delete_by_id, ensure_exists, ensure_ordered, fetch_page, first_row,
    map_constraint, now_ms, optional_text, require_text, uuid_col,
};
use super::{RepoError, RepoResult, ResourceRepository};
use crate::model::credential::{
    CredentialStatus, CredentialTemplate, CredentialTemplateDetail, IssueCredential,
    IssuedCredential, NewCredentialTemplate, TemplateId,
};
use crate::model::page::{Deleted, Page};
use crate::model::person::PersonId;
use crate::query::{
    build_patch, ColumnKind, FilterColumn, FilterKind, PageRequest, Predicate, QueryParams,
    ResourceDescriptor, UpdatableColumn,
};
use chrono::{Datelike, Local, NaiveDate};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

const DUPLICATE_CREDENTIAL_NUMBER: &str = "credential number already exists";
const EXPIRY_BEFORE_ISSUE: &str = "`expiry_date` cannot be before `issue_date`";

pub const CREDENTIAL_TEMPLATE_RESOURCE: ResourceDescriptor = ResourceDescriptor {
    resource: "credential template",
    table: "credential_templates",
    columns_sql: "t.id, t.name, t.description, t.field_placements,
        (SELECT COUNT(*) FROM issued_credentials ic WHERE ic.template_id = t.id) AS issued_count,
        t.created_at, t.updated_at",
    from_sql: "FROM credential_templates t",
    filters: &[],
    search_columns: &["t.name", "t.description"],
    order_by: "t.name COLLATE NOCASE ASC, t.id ASC",
    updatable: &[
        UpdatableColumn::required("name", ColumnKind::Text),
        UpdatableColumn::optional("description", ColumnKind::Text),
        UpdatableColumn::required("field_placements", ColumnKind::Json),
    ],
};

pub const ISSUED_CREDENTIAL_RESOURCE: ResourceDescriptor = ResourceDescriptor {
    resource: "issued credential",
    table: "issued_credentials",
    columns_sql: "ic.id, ic.template_id, t.name AS template_name, ic.person_id,
        p.title AS person_title, p.first_name AS person_first_name,
        p.last_name AS person_last_name, ic.credential_number, ic.issue_date,
        ic.expiry_date, ic.status, ic.created_at, ic.updated_at",
    from_sql: "FROM issued_credentials ic
        INNER JOIN credential_templates t ON t.id = ic.template_id
        INNER JOIN people p ON p.id = ic.person_id",
    filters: &[
        FilterColumn::new("person_id", "ic.person_id", FilterKind::Exact),
        FilterColumn::new("template_id", "ic.template_id", FilterKind::Exact),
        FilterColumn::new("status", "ic.status", FilterKind::Status),
    ],
    search_columns: &["ic.credential_number", "p.first_name", "p.last_name"],
    order_by: "ic.issue_date DESC, ic.created_at DESC, ic.id ASC",
    updatable: &[
        UpdatableColumn::required("issue_date", ColumnKind::Date),
        UpdatableColumn::optional("expiry_date", ColumnKind::Date),
        UpdatableColumn::required("status", ColumnKind::Enum(CredentialStatus::VALUES)),
    ],
};

/// SQLite-backed credential template repository.
pub struct SqliteCredentialTemplateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCredentialTemplateRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn find(&self, id: TemplateId) -> RepoResult<Option<CredentialTemplate>> {
        first_row(
            self.conn,
            &format!(
                "SELECT {} {} WHERE t.id = ?1;",
                CREDENTIAL_TEMPLATE_RESOURCE.columns_sql, CREDENTIAL_TEMPLATE_RESOURCE.from_sql
            ),
            [id.to_string()],
            parse_template_row,
        )
    }

    fn require(&self, id: TemplateId) -> RepoResult<CredentialTemplate> {
        self.find(id)?
            .ok_or_else(|| RepoError::not_found(CREDENTIAL_TEMPLATE_RESOURCE.resource, id))
    }
}

impl ResourceRepository for SqliteCredentialTemplateRepository<'_> {
    type Record = CredentialTemplate;
    type Detail = CredentialTemplateDetail;
    type Draft = NewCredentialTemplate;

    fn list(&self, params: &QueryParams, page: PageRequest) -> RepoResult<Page<CredentialTemplate>> {
        let predicate = Predicate::from_params(&CREDENTIAL_TEMPLATE_RESOURCE, params);
        fetch_page(
            self.conn,
            &CREDENTIAL_TEMPLATE_RESOURCE,
            &predicate,
            CREDENTIAL_TEMPLATE_RESOURCE.order_by,
            page,
            parse_template_row,
        )
    }

    fn get(&self, id: TemplateId) -> RepoResult<CredentialTemplateDetail> {
        let template = self.require(id)?;
        let issued = collect_rows(
            self.conn,
            &format!(
                "SELECT {} {} WHERE ic.template_id = ?1 ORDER BY {};",
                ISSUED_CREDENTIAL_RESOURCE.columns_sql,
                ISSUED_CREDENTIAL_RESOURCE.from_sql,
                ISSUED_CREDENTIAL_RESOURCE.order_by
            ),
            [id.to_string()],
            parse_issued_row,
        )?;
        Ok(CredentialTemplateDetail { template, issued })
    }

    fn create(&self, draft: &NewCredentialTemplate) -> RepoResult<CredentialTemplate> {
        let name = require_text("name", &draft.name)?;
        let placements = draft
            .field_placements
            .clone()
            .unwrap_or_else(|| JsonValue::Array(Vec::new()));

        let id = Uuid::new_v4();
        let now = now_ms();
        self.conn
            .execute(
                "INSERT INTO credential_templates (
                    id, name, description, field_placements, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?5);",
                params![
                    id.to_string(),
                    name,
                    optional_text(draft.description.as_deref()),
                    placements,
                    now,
                ],
            )
            .map_err(|err| map_constraint(err, "credential template already exists"))?;
        self.require(id)
    }

    fn update(&self, id: TemplateId, patch: &Map<String, JsonValue>) -> RepoResult<CredentialTemplate> {
        let patch = build_patch(&CREDENTIAL_TEMPLATE_RESOURCE, patch)?;
        let (sql, binds) = patch.into_update(
            CREDENTIAL_TEMPLATE_RESOURCE.table,
            "id = ?",
            [Value::Text(id.to_string())],
            now_ms(),
        );
        let changed = self.conn.execute(&sql, params_from_iter(binds.iter()))?;
        if changed == 0 {
            return Err(RepoError::not_found(CREDENTIAL_TEMPLATE_RESOURCE.resource, id));
        }
        self.require(id)
    }

    fn delete(&self, id: TemplateId) -> RepoResult<Deleted> {
        delete_by_id(
            self.conn,
            CREDENTIAL_TEMPLATE_RESOURCE.table,
            CREDENTIAL_TEMPLATE_RESOURCE.resource,
            id,
        )
    }
}

/// SQLite-backed repository of credentials issued to people.
pub struct SqliteIssuedCredentialRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteIssuedCredentialRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn find(&self, id: Uuid) -> RepoResult<Option<IssuedCredential>> {
        first_row(
            self.conn,
            &format!(
                "SELECT {} {} WHERE ic.id = ?1;",
                ISSUED_CREDENTIAL_RESOURCE.columns_sql, ISSUED_CREDENTIAL_RESOURCE.from_sql
            ),
            [id.to_string()],
            parse_issued_row,
        )
    }

    fn require(&self, id: Uuid) -> RepoResult<IssuedCredential> {
        self.find(id)?
            .ok_or_else(|| RepoError::not_found(ISSUED_CREDENTIAL_RESOURCE.resource, id))
    }

    /// Issues one credential, generating its number from the issue year.
    ///
    /// `issue_date` defaults to the local calendar day.
    ///
    /// # Errors
    /// - `NotFound` when the template or person does not exist.
    /// - `Validation` when `expiry_date` precedes `issue_date`.
    /// - `Conflict` on a credential number collision.
    pub fn issue(&self, request: &IssueCredential) -> RepoResult<IssuedCredential> {
        ensure_exists(
            self.conn,
            CREDENTIAL_TEMPLATE_RESOURCE.table,
            CREDENTIAL_TEMPLATE_RESOURCE.resource,
            request.template_id,
        )?;
        ensure_exists(self.conn, "people", "person", request.person_id)?;

        let issue_date = request
            .issue_date
            .unwrap_or_else(|| Local::now().date_naive());
        ensure_ordered(Some(&issue_date), request.expiry_date.as_ref(), EXPIRY_BEFORE_ISSUE)?;

        let id = Uuid::new_v4();
        let now = now_ms();
        self.conn
            .execute(
                "INSERT INTO issued_credentials (
                    id, template_id, person_id, credential_number, issue_date, expiry_date,
                    status, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);",
                params![
                    id.to_string(),
                    request.template_id.to_string(),
                    request.person_id.to_string(),
                    credential_number(issue_date, id),
                    issue_date,
                    request.expiry_date,
                    CredentialStatus::Active,
                    now,
                ],
            )
            .map_err(|err| map_constraint(err, DUPLICATE_CREDENTIAL_NUMBER))?;
        self.require(id)
    }

    /// Flips every `ACTIVE` credential whose expiry date is before `today`
    /// to `EXPIRED`. Returns the number of rows changed.
    pub fn expire_lapsed(&self, today: NaiveDate) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE issued_credentials
             SET status = ?1, updated_at = ?2
             WHERE status = ?3 AND expiry_date IS NOT NULL AND expiry_date < ?4;",
            params![
                CredentialStatus::Expired,
                now_ms(),
                CredentialStatus::Active,
                today
            ],
        )?;
        info!("event=credentials_expire module=repo status=ok changed={changed}");
        Ok(changed)
    }
}

impl ResourceRepository for SqliteIssuedCredentialRepository<'_> {
    type Record = IssuedCredential;
    type Detail = IssuedCredential;
    type Draft = IssueCredential;

    fn list(&self, params: &QueryParams, page: PageRequest) -> RepoResult<Page<IssuedCredential>> {
        let predicate = Predicate::from_params(&ISSUED_CREDENTIAL_RESOURCE, params);
        fetch_page(
            self.conn,
            &ISSUED_CREDENTIAL_RESOURCE,
            &predicate,
            ISSUED_CREDENTIAL_RESOURCE.order_by,
            page,
            parse_issued_row,
        )
    }

    fn get(&self, id: Uuid) -> RepoResult<IssuedCredential> {
        self.require(id)
    }

    fn create(&self, draft: &IssueCredential) -> RepoResult<IssuedCredential> {
        self.issue(draft)
    }

    fn update(&self, id: Uuid, patch: &Map<String, JsonValue>) -> RepoResult<IssuedCredential> {
        let patch = build_patch(&ISSUED_CREDENTIAL_RESOURCE, patch)?;
        if patch.touches("issue_date") || patch.touches("expiry_date") {
            let current = self.require(id)?;
            ensure_ordered(
                patch.merged("issue_date", Some(current.issue_date)).as_ref(),
                patch.merged("expiry_date", current.expiry_date).as_ref(),
                EXPIRY_BEFORE_ISSUE,
            )?;
        }
        let (sql, binds) = patch.into_update(
            ISSUED_CREDENTIAL_RESOURCE.table,
            "id = ?",
            [Value::Text(id.to_string())],
            now_ms(),
        );
        let changed = self.conn.execute(&sql, params_from_iter(binds.iter()))?;
        if changed == 0 {
            return Err(RepoError::not_found(ISSUED_CREDENTIAL_RESOURCE.resource, id));
        }
        self.require(id)
    }

    fn delete(&self, id: Uuid) -> RepoResult<Deleted> {
        delete_by_id(
            self.conn,
            ISSUED_CREDENTIAL_RESOURCE.table,
            ISSUED_CREDENTIAL_RESOURCE.resource,
            id,
        )
    }
}

/// Credentials held by one person, most recently issued first.
pub(crate) fn list_credentials_for_person(
    conn: &Connection,
    person_id: PersonId,
) -> RepoResult<Vec<IssuedCredential>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {} {} WHERE ic.person_id = ?1 ORDER BY {};",
            ISSUED_CREDENTIAL_RESOURCE.columns_sql,
            ISSUED_CREDENTIAL_RESOURCE.from_sql,
            ISSUED_CREDENTIAL_RESOURCE.order_by
        ),
        [person_id.to_string()],
        parse_issued_row,
    )
}

/// `CRED-<year>-<first 8 hex digits of the row id, upper-cased>`.
fn credential_number(issue_date: NaiveDate, id: Uuid) -> String {
    let simple = id.simple().to_string().to_uppercase();
    format!("CRED-{}-{}", issue_date.year(), &simple[..8])
}

fn parse_template_row(row: &Row<'_>) -> RepoResult<CredentialTemplate> {
    Ok(CredentialTemplate {
        id: uuid_col(row, "id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        field_placements: row.get("field_placements")?,
        issued_count: count_col(row, "issued_count")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_issued_row(row: &Row<'_>) -> RepoResult<IssuedCredential> {
    Ok(IssuedCredential {
        id: uuid_col(row, "id")?,
        template_id: uuid_col(row, "template_id")?,
        template_name: row.get("template_name")?,
        person_id: uuid_col(row, "person_id")?,
        display_name: joined_display_name(row, "person_")?,
        credential_number: row.get("credential_number")?,
        issue_date: row.get("issue_date")?,
        expiry_date: row.get("expiry_date")?,
        status: row.get("status")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
