//! Static per-resource column allow-lists.

/// How one filter parameter is turned into a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// `column = ?` with the raw value.
    Exact,
    /// `column = ?` with the value upper-cased; `all` disables the filter.
    Status,
    /// `column = ?` with `0|1`; unparseable values disable the filter.
    Bool,
    /// `column >= ?` with an ISO date; unparseable values disable the filter.
    DateFrom,
    /// `column <= ?` with an ISO date; unparseable values disable the filter.
    DateTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterColumn {
    /// Request parameter name.
    pub param: &'static str,
    /// Qualified SQL column the parameter filters on.
    pub column: &'static str,
    pub kind: FilterKind,
}

impl FilterColumn {
    pub const fn new(param: &'static str, column: &'static str, kind: FilterKind) -> Self {
        Self {
            param,
            column,
            kind,
        }
    }
}

/// Storage type of an updatable column, used to coerce JSON patch values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// Lower-cased, shape-checked e-mail address.
    Email,
    /// Upper-cased value restricted to the listed spellings.
    Enum(&'static [&'static str]),
    Real,
    Bool,
    /// ISO `YYYY-MM-DD`.
    Date,
    /// `HH:MM`, 24h clock.
    Time,
    /// UUID of another row.
    Reference,
    /// Arbitrary JSON document stored as text.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatableColumn {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Whether `null` / blank clears the column.
    pub nullable: bool,
}

impl UpdatableColumn {
    pub const fn required(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    pub const fn optional(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }
}

/// Everything the generic list/patch routines may touch for one resource.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    /// Resource label used in error messages (`person`, `course`, ...).
    pub resource: &'static str,
    /// Unaliased table name for writes.
    pub table: &'static str,
    /// Select list for page queries.
    pub columns_sql: &'static str,
    /// `FROM ...` clause including joins, shared by page and count queries.
    pub from_sql: &'static str,
    pub filters: &'static [FilterColumn],
    /// Columns matched by the `search` parameter.
    pub search_columns: &'static [&'static str],
    /// Fixed `ORDER BY` body for listings.
    pub order_by: &'static str,
    pub updatable: &'static [UpdatableColumn],
}

impl ResourceDescriptor {
    pub fn updatable_column(&self, name: &str) -> Option<&UpdatableColumn> {
        self.updatable.iter().find(|column| column.name == name)
    }
}
