//! Response envelopes shared by list and delete endpoints.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Group-by tallies keyed by dimension, then by value.
pub type Counts = BTreeMap<String, BTreeMap<String, u64>>;

/// One page of a filtered listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Row count of the full filtered result, ignoring pagination.
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<Counts>,
}

/// Successful delete acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
    pub deleted: bool,
}

impl Deleted {
    pub const YES: Self = Self { deleted: true };
}
