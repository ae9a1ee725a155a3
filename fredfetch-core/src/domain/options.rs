//! Per-request fetch options.

use crate::data::FetchError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default maximum number of observations per request.
pub const DEFAULT_LIMIT: u32 = 1000;

/// Order of observations in the response.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "asc", alias = "ascending")]
    Ascending,
    #[serde(rename = "desc", alias = "descending")]
    Descending,
}

impl SortOrder {
    /// Wire value used by the FRED API and in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(format!("unknown sort order '{other}' (expected asc or desc)")),
        }
    }
}

/// Options for a single series request.
///
/// `observation_start` and `observation_end` are both inclusive. They are sent
/// to the service but are not part of the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    pub limit: u32,
    pub sort_order: SortOrder,
    pub observation_start: Option<NaiveDate>,
    pub observation_end: Option<NaiveDate>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            sort_order: SortOrder::Ascending,
            observation_start: None,
            observation_end: None,
        }
    }
}

impl FetchOptions {
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_window(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.observation_start = start;
        self.observation_end = end;
        self
    }

    /// Check `limit >= 1` and `start <= end` when both are present.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.limit == 0 {
            return Err(FetchError::InvalidRequest(
                "limit must be a positive integer".into(),
            ));
        }
        if let (Some(start), Some(end)) = (self.observation_start, self.observation_end) {
            if start > end {
                return Err(FetchError::InvalidRequest(format!(
                    "observation_start {start} is after observation_end {end}"
                )));
            }
        }
        Ok(())
    }
}
