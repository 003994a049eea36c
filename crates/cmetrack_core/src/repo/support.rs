//! Row decoding, constraint mapping and list execution shared by repositories.

use super::{RepoError, RepoResult};
use crate::model::page::{Deleted, Page};
use crate::query::{build_list_query, PageRequest, Predicate, ResourceDescriptor};
use rusqlite::ffi;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Params, Row};
use uuid::Uuid;

/// Current wall clock as epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn uuid_col(row: &Row<'_>, column: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{text}` in {column}")))
}

pub(crate) fn opt_uuid_col(row: &Row<'_>, column: &str) -> RepoResult<Option<Uuid>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => Uuid::parse_str(&text).map(Some).map_err(|_| {
            RepoError::InvalidData(format!("invalid uuid value `{text}` in {column}"))
        }),
        None => Ok(None),
    }
}

pub(crate) fn count_col(row: &Row<'_>, column: &str) -> RepoResult<u64> {
    let count: i64 = row.get(column)?;
    Ok(u64::try_from(count).unwrap_or_default())
}

/// Trims a required text field, rejecting blank input.
pub(crate) fn require_text(field: &str, value: &str) -> RepoResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RepoError::Validation(format!("`{field}` is required")));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional text field; blank input becomes `None`.
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Rejects a `(low, high)` pair where both are set and `high` sorts first.
pub(crate) fn ensure_ordered<T: PartialOrd>(
    low: Option<&T>,
    high: Option<&T>,
    message: &str,
) -> RepoResult<()> {
    match (low, high) {
        (Some(low), Some(high)) if high < low => Err(RepoError::Validation(message.to_string())),
        _ => Ok(()),
    }
}

/// Maps storage constraint failures onto the caller-facing taxonomy.
///
/// Unique/primary-key violations become `Conflict(conflict_message)`;
/// foreign-key violations mean a referenced row does not exist.
pub(crate) fn map_constraint(err: rusqlite::Error, conflict_message: &str) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return RepoError::Conflict(conflict_message.to_string());
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return RepoError::Validation("referenced record does not exist".to_string());
            }
            ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                return RepoError::Validation("value violates a column constraint".to_string());
            }
            _ => {}
        }
    }
    err.into()
}

pub(crate) fn collect_rows<T, P, F>(
    conn: &Connection,
    sql: &str,
    params: P,
    mut map_row: F,
) -> RepoResult<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> RepoResult<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(map_row(row)?);
    }
    Ok(items)
}

pub(crate) fn first_row<T, P, F>(
    conn: &Connection,
    sql: &str,
    params: P,
    map_row: F,
) -> RepoResult<Option<T>>
where
    P: Params,
    F: FnOnce(&Row<'_>) -> RepoResult<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(map_row(row)?)),
        None => Ok(None),
    }
}

/// Runs the count and page statements for one predicate.
pub(crate) fn fetch_page<T, F>(
    conn: &Connection,
    descriptor: &ResourceDescriptor,
    predicate: &Predicate,
    order_by: &str,
    page: PageRequest,
    map_row: F,
) -> RepoResult<Page<T>>
where
    F: FnMut(&Row<'_>) -> RepoResult<T>,
{
    let query = build_list_query(descriptor, predicate, order_by, page);
    let total: i64 = conn.query_row(
        &query.count_sql,
        params_from_iter(query.count_binds.iter()),
        |row| row.get(0),
    )?;
    let data = collect_rows(
        conn,
        &query.page_sql,
        params_from_iter(query.page_binds.iter()),
        map_row,
    )?;

    Ok(Page {
        data,
        total: u64::try_from(total).unwrap_or_default(),
        page: page.page,
        limit: page.limit,
        counts: None,
    })
}

pub(crate) fn row_exists(conn: &Connection, table: &str, id: Uuid) -> RepoResult<bool> {
    let found = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE id = ?1;"),
            [id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn ensure_exists(
    conn: &Connection,
    table: &str,
    resource: &'static str,
    id: Uuid,
) -> RepoResult<()> {
    if row_exists(conn, table, id)? {
        Ok(())
    } else {
        Err(RepoError::not_found(resource, id))
    }
}

pub(crate) fn delete_by_id(
    conn: &Connection,
    table: &str,
    resource: &'static str,
    id: Uuid,
) -> RepoResult<Deleted> {
    let changed = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1;"), [id.to_string()])?;
    if changed == 0 {
        return Err(RepoError::not_found(resource, id));
    }
    Ok(Deleted::YES)
}
