//! Filter, pagination and partial-update assembly.
//!
//! # Responsibility
//! - Turn loosely-typed request parameters into parameterized SQL fragments.
//! - Keep every filterable/updatable column behind a static per-resource
//!   allow-list ([`descriptor::ResourceDescriptor`]).
//!
//! # Invariants
//! - Request values are only ever bound as parameters, never spliced into SQL.
//! - Positional `?` placeholders are bound in clause-append order.
//! - Unknown parameter keys are ignored.

pub mod descriptor;
pub mod params;
pub mod patch;
pub mod predicate;

pub use descriptor::{ColumnKind, FilterColumn, FilterKind, ResourceDescriptor, UpdatableColumn};
pub use params::{PageLimits, PageRequest, QueryParams};
pub use patch::{build_patch, Patch};
pub use predicate::{
    build_list_query, normalize_status_filter, parse_iso_date, ListQuery, Predicate,
};
