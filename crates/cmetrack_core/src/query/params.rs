//! Request parameter bag and pagination parsing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Loosely-typed query-string parameters, as received from the edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for callers assembling filters in code.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the trimmed value for `key`; blank values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Default and ceiling applied to the `limit` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// Normalized pagination request; `page` and `limit` are always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Reads `page` / `limit` from request parameters.
    ///
    /// Missing, unparseable or zero values fall back to page 1 and the
    /// default limit; `limit` is clamped to `limits.max_limit`.
    pub fn from_params(params: &QueryParams, limits: PageLimits) -> Self {
        let page = parse_positive(params.get("page")).unwrap_or(1);
        let limit = parse_positive(params.get("limit"))
            .unwrap_or(limits.default_limit)
            .min(limits.max_limit.max(1));
        Self::new(page, limit)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, PageLimits::default().default_limit)
    }
}

fn parse_positive(value: Option<&str>) -> Option<u32> {
    value
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
}

#[cfg(test)]
mod tests {
    use super::{PageLimits, PageRequest, QueryParams};

    #[test]
    fn blank_values_are_treated_as_absent() {
        let params = QueryParams::new().with("search", "   ");
        assert_eq!(params.get("search"), None);
    }

    #[test]
    fn page_request_defaults_and_clamps() {
        let limits = PageLimits::default();
        let defaulted = PageRequest::from_params(&QueryParams::new(), limits);
        assert_eq!(defaulted, PageRequest::new(1, 20));

        let params = QueryParams::new().with("page", "0").with("limit", "5000");
        assert_eq!(PageRequest::from_params(&params, limits), PageRequest::new(1, 100));

        let params = QueryParams::new().with("page", "abc").with("limit", "-3");
        assert_eq!(PageRequest::from_params(&params, limits), PageRequest::new(1, 20));
    }

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(PageRequest::new(1, 10).offset(), 0);
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
    }
}
