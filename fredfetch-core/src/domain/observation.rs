//! Observation — one dated data point of a series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Placeholder FRED uses for an unavailable observation.
pub const MISSING_VALUE: &str = ".";

/// A single (date, value) point.
///
/// The value is kept as the decimal string the service sent so that cached
/// and emitted output is byte-identical to what was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: String,
}

impl Observation {
    pub fn new(date: NaiveDate, value: impl Into<String>) -> Self {
        Self {
            date,
            value: value.into(),
        }
    }

    /// True if the value is the service's missing-value marker.
    pub fn is_missing(&self) -> bool {
        self.value == MISSING_VALUE
    }
}
