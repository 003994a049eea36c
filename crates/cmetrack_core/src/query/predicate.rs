//! WHERE-clause assembly and count/page query generation.

use super::descriptor::{FilterKind, ResourceDescriptor};
use super::params::{PageRequest, QueryParams};
use chrono::{Datelike, NaiveDate};
use rusqlite::types::Value;

const SEARCH_PARAM: &str = "search";

/// Conjunction of filter clauses plus their bound values, in append order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<String>,
    binds: Vec<Value>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the predicate for every recognized parameter of `descriptor`.
    ///
    /// Filters are applied in descriptor order, then the text search group.
    pub fn from_params(descriptor: &ResourceDescriptor, params: &QueryParams) -> Self {
        let mut predicate = Self::new();

        for filter in descriptor.filters {
            let Some(raw) = params.get(filter.param) else {
                continue;
            };
            let (operator, value) = match filter.kind {
                FilterKind::Exact => ("=", Some(Value::Text(raw.to_string()))),
                FilterKind::Status => ("=", normalize_status_filter(raw).map(Value::Text)),
                FilterKind::Bool => ("=", parse_bool(raw).map(|flag| Value::Integer(i64::from(flag)))),
                FilterKind::DateFrom => (">=", parse_date(raw)),
                FilterKind::DateTo => ("<=", parse_date(raw)),
            };
            if let Some(value) = value {
                predicate.push(format!("{} {operator} ?", filter.column), [value]);
            }
        }

        if let Some(term) = params.get(SEARCH_PARAM) {
            predicate.push_search(descriptor.search_columns, term);
        }

        predicate
    }

    /// Appends one clause with its values; placeholders must match `binds`.
    pub fn push(&mut self, clause: impl Into<String>, binds: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.binds.extend(binds);
    }

    /// Appends a case-insensitive partial match OR-ed across `columns`.
    ///
    /// Both sides are folded with Unicode rules through the connection's
    /// `casefold` function.
    pub fn push_search(&mut self, columns: &[&str], term: &str) {
        if columns.is_empty() {
            return;
        }
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        let group = columns
            .iter()
            .map(|column| format!("casefold({column}) LIKE ? ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.push(
            format!("({group})"),
            columns.iter().map(|_| Value::Text(pattern.clone())),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Returns ` WHERE a AND b`, or an empty string when unfiltered.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn binds(&self) -> &[Value] {
        &self.binds
    }
}

/// Count and page statements sharing one predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub count_sql: String,
    pub count_binds: Vec<Value>,
    pub page_sql: String,
    pub page_binds: Vec<Value>,
}

/// Builds the total-count query and the `LIMIT/OFFSET` page query.
pub fn build_list_query(
    descriptor: &ResourceDescriptor,
    predicate: &Predicate,
    order_by: &str,
    page: PageRequest,
) -> ListQuery {
    let where_sql = predicate.where_sql();
    let count_sql = format!("SELECT COUNT(*) {}{where_sql};", descriptor.from_sql);
    let page_sql = format!(
        "SELECT {} {}{where_sql} ORDER BY {order_by} LIMIT ? OFFSET ?;",
        descriptor.columns_sql, descriptor.from_sql
    );

    let mut page_binds = predicate.binds().to_vec();
    page_binds.push(Value::Integer(i64::from(page.limit)));
    page_binds.push(Value::Integer(
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    ));

    ListQuery {
        count_sql,
        count_binds: predicate.binds().to_vec(),
        page_sql,
        page_binds,
    }
}

/// Upper-cases a status filter; `all` means no filter.
pub fn normalize_status_filter(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(trimmed.to_ascii_uppercase())
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<Value> {
    parse_iso_date(raw).map(|date| Value::Text(date.format("%Y-%m-%d").to_string()))
}

/// Parses a `YYYY-MM-DD` date with a four-digit year.
///
/// Stored dates compare as text, which only orders correctly for years 0000 to 9999.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .filter(|date| (0..=9999).contains(&date.year()))
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
