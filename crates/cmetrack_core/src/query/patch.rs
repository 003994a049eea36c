//! Partial-update (`PATCH`) assembly over an updatable-column allow-list.
//!
//! # Invariants
//! - Only keys that are both allow-listed and present in the body are written.
//! - Absent keys are left untouched; explicit `null` clears nullable columns.
//! - A body with zero recognized keys is rejected before touching storage.
//! - Every built statement also stamps `updated_at`.

use super::descriptor::{ColumnKind, ResourceDescriptor, UpdatableColumn};
use super::predicate::{parse_bool, parse_iso_date};
use crate::repo::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use serde_json::{Map, Value as JsonValue};
use std::str::FromStr;
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("valid time regex"));

/// Validated SET assignments for one row update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    assignments: Vec<String>,
    binds: Vec<Value>,
    touched: Vec<&'static str>,
}

impl Patch {
    /// Whether the request body rewrote `column`.
    pub fn touches(&self, column: &str) -> bool {
        self.touched.contains(&column)
    }

    /// Text the body assigned to `column`: `None` when untouched, `Some(None)` when cleared.
    pub fn assigned_text(&self, column: &str) -> Option<Option<&str>> {
        let index = self.touched.iter().rposition(|name| *name == column)?;
        match &self.binds[index] {
            Value::Text(text) => Some(Some(text.as_str())),
            _ => Some(None),
        }
    }

    /// The value `column` will hold after this patch, given its `current` value.
    pub fn merged<T: FromStr>(&self, column: &str, current: Option<T>) -> Option<T> {
        match self.assigned_text(column) {
            None => current,
            Some(text) => text.and_then(|text| text.parse().ok()),
        }
    }

    /// Adds a server-derived assignment that was not part of the body.
    pub fn set(&mut self, column: &'static str, value: Value) {
        self.assignments.push(format!("{column} = ?"));
        self.binds.push(value);
        self.touched.push(column);
    }

    /// Renders `UPDATE <table> SET ..., updated_at = ? WHERE <where_sql>`.
    ///
    /// `where_binds` are appended after the assignment values and timestamp.
    pub fn into_update(
        self,
        table: &str,
        where_sql: &str,
        where_binds: impl IntoIterator<Item = Value>,
        now_ms: i64,
    ) -> (String, Vec<Value>) {
        let sql = format!(
            "UPDATE {table} SET {}, updated_at = ? WHERE {where_sql};",
            self.assignments.join(", ")
        );
        let mut binds = self.binds;
        binds.push(Value::Integer(now_ms));
        binds.extend(where_binds);
        (sql, binds)
    }
}

/// Builds a patch from a JSON object against `descriptor.updatable`.
///
/// # Errors
/// - `Validation` when no allow-listed key is present.
/// - `Validation` when a present value cannot be coerced to its column kind.
pub fn build_patch(descriptor: &ResourceDescriptor, body: &Map<String, JsonValue>) -> RepoResult<Patch> {
    let mut patch = Patch::default();
    for column in descriptor.updatable {
        let Some(raw) = body.get(column.name) else {
            continue;
        };
        let value = coerce(column, raw)?;
        patch.assignments.push(format!("{} = ?", column.name));
        patch.binds.push(value);
        patch.touched.push(column.name);
    }

    if patch.touched.is_empty() {
        return Err(RepoError::Validation(format!(
            "no updatable {} fields supplied",
            descriptor.resource
        )));
    }
    Ok(patch)
}

fn coerce(column: &UpdatableColumn, raw: &JsonValue) -> RepoResult<Value> {
    if raw.is_null() {
        return null_or_error(column);
    }

    match column.kind {
        ColumnKind::Text => match non_blank(column, raw)? {
            Some(text) => Ok(Value::Text(text)),
            None => null_or_error(column),
        },
        ColumnKind::Email => match non_blank(column, raw)? {
            Some(text) => normalize_email(&text)
                .map(Value::Text)
                .ok_or_else(|| invalid(column, "a valid email address")),
            None => null_or_error(column),
        },
        ColumnKind::Enum(allowed) => {
            let text = non_blank(column, raw)?.unwrap_or_default().to_ascii_uppercase();
            if allowed.contains(&text.as_str()) {
                Ok(Value::Text(text))
            } else {
                Err(invalid(column, &format!("one of {}", allowed.join("|"))))
            }
        }
        ColumnKind::Real => {
            let number = match raw {
                JsonValue::Number(number) => number.as_f64(),
                JsonValue::String(text) => text.trim().parse::<f64>().ok(),
                _ => None,
            };
            number
                .filter(|value| value.is_finite() && *value >= 0.0)
                .map(Value::Real)
                .ok_or_else(|| invalid(column, "a non-negative number"))
        }
        ColumnKind::Bool => {
            let flag = match raw {
                JsonValue::Bool(flag) => Some(*flag),
                JsonValue::Number(number) => match number.as_i64() {
                    Some(0) => Some(false),
                    Some(1) => Some(true),
                    _ => None,
                },
                JsonValue::String(text) => parse_bool(text),
                _ => None,
            };
            flag.map(|flag| Value::Integer(i64::from(flag)))
                .ok_or_else(|| invalid(column, "a boolean"))
        }
        ColumnKind::Date => match non_blank(column, raw)? {
            Some(text) => parse_iso_date(&text)
                .map(|date| Value::Text(date.format("%Y-%m-%d").to_string()))
                .ok_or_else(|| invalid(column, "a YYYY-MM-DD date")),
            None => null_or_error(column),
        },
        ColumnKind::Time => match non_blank(column, raw)? {
            Some(text) if is_valid_time(&text) => Ok(Value::Text(text)),
            Some(_) => Err(invalid(column, "an HH:MM time")),
            None => null_or_error(column),
        },
        ColumnKind::Reference => match non_blank(column, raw)? {
            Some(text) => Uuid::parse_str(&text)
                .map(|id| Value::Text(id.to_string()))
                .map_err(|_| invalid(column, "a UUID")),
            None => null_or_error(column),
        },
        ColumnKind::Json => Ok(Value::Text(raw.to_string())),
    }
}

fn non_blank(column: &UpdatableColumn, raw: &JsonValue) -> RepoResult<Option<String>> {
    let JsonValue::String(text) = raw else {
        return Err(invalid(column, "a string"));
    };
    let trimmed = text.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

fn null_or_error(column: &UpdatableColumn) -> RepoResult<Value> {
    if column.nullable {
        Ok(Value::Null)
    } else {
        Err(RepoError::Validation(format!("`{}` cannot be empty", column.name)))
    }
}

fn invalid(column: &UpdatableColumn, expected: &str) -> RepoError {
    RepoError::Validation(format!("`{}` must be {expected}", column.name))
}

/// Trims and lower-cases an address; `None` when it is not e-mail shaped.
pub(crate) fn normalize_email(raw: &str) -> Option<String> {
    let normalized = raw.trim().to_lowercase();
    EMAIL_RE.is_match(&normalized).then_some(normalized)
}

pub(crate) fn is_valid_time(raw: &str) -> bool {
    TIME_RE.is_match(raw)
}

#[cfg(test)]
mod tests {
    use super::build_patch;
    use crate::query::descriptor::{ColumnKind, ResourceDescriptor, UpdatableColumn};
    use crate::repo::RepoError;
    use rusqlite::types::Value;
    use serde_json::json;

    const GADGETS: ResourceDescriptor = ResourceDescriptor {
        resource: "gadget",
        table: "gadgets",
        columns_sql: "g.*",
        from_sql: "FROM gadgets g",
        filters: &[],
        search_columns: &[],
        order_by: "g.id",
        updatable: &[
            UpdatableColumn::required("name", ColumnKind::Text),
            UpdatableColumn::optional("email", ColumnKind::Email),
            UpdatableColumn::required("status", ColumnKind::Enum(&["ON", "OFF"])),
            UpdatableColumn::required("enabled", ColumnKind::Bool),
            UpdatableColumn::optional("starts_at", ColumnKind::Time),
        ],
    };

    fn body(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn only_present_allow_listed_keys_are_written() {
        let patch = build_patch(
            &GADGETS,
            &body(json!({"status": "off", "unknown": 1, "enabled": "yes"})),
        )
        .unwrap();
        assert!(patch.touches("status"));
        assert!(patch.touches("enabled"));
        assert!(!patch.touches("name"));

        let (sql, binds) = patch.into_update("gadgets", "id = ?", [Value::Text("g1".into())], 42);
        assert_eq!(
            sql,
            "UPDATE gadgets SET status = ?, enabled = ?, updated_at = ? WHERE id = ?;"
        );
        assert_eq!(
            binds,
            vec![
                Value::Text("OFF".into()),
                Value::Integer(1),
                Value::Integer(42),
                Value::Text("g1".into()),
            ]
        );
    }

    #[test]
    fn zero_recognized_keys_is_a_validation_error() {
        let err = build_patch(&GADGETS, &body(json!({"colour": "red"}))).unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[test]
    fn null_clears_only_nullable_columns() {
        let patch = build_patch(&GADGETS, &body(json!({"email": null}))).unwrap();
        let (_, binds) = patch.into_update("gadgets", "id = ?", [], 0);
        assert_eq!(binds[0], Value::Null);

        let err = build_patch(&GADGETS, &body(json!({"name": "  "}))).unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[test]
    fn values_are_checked_against_column_kind() {
        for bad in [
            json!({"status": "broken"}),
            json!({"email": "not-an-address"}),
            json!({"starts_at": "25:00"}),
            json!({"enabled": "sometimes"}),
            json!({"name": 7}),
        ] {
            let err = build_patch(&GADGETS, &body(bad)).unwrap_err();
            assert!(matches!(err, RepoError::Validation(_)));
        }
    }

    #[test]
    fn merged_prefers_assigned_values_over_current_ones() {
        let patch =
            build_patch(&GADGETS, &body(json!({"starts_at": "08:30", "email": null}))).unwrap();
        assert_eq!(
            patch.merged::<String>("starts_at", Some("09:00".into())).as_deref(),
            Some("08:30")
        );
        assert_eq!(patch.merged::<String>("email", Some("a@b.io".into())), None);
        assert_eq!(
            patch.merged::<String>("name", Some("kept".into())).as_deref(),
            Some("kept")
        );
    }
}
