//! SeriesResult — the normalized outcome of fetching one series.

use super::observation::Observation;
use crate::data::FetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized, filtered observations for one series.
///
/// Constructed once by the fetcher (or loaded from cache) and never mutated.
/// `count` always equals the number of observations and no observation
/// carries the missing-value marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesResult {
    series_id: String,
    retrieved_at: DateTime<Utc>,
    count: usize,
    observations: Vec<Observation>,
}

impl SeriesResult {
    /// Build a result, dropping any missing-value observations.
    pub fn new(
        series_id: impl Into<String>,
        retrieved_at: DateTime<Utc>,
        observations: Vec<Observation>,
    ) -> Self {
        let observations: Vec<Observation> =
            observations.into_iter().filter(|o| !o.is_missing()).collect();
        Self {
            series_id: series_id.into(),
            retrieved_at,
            count: observations.len(),
            observations,
        }
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    pub fn retrieved_at(&self) -> DateTime<Utc> {
        self.retrieved_at
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Check the invariants a deserialized result must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        if self.count != self.observations.len() {
            return Err(format!(
                "count {} does not match {} observations",
                self.count,
                self.observations.len()
            ));
        }
        if let Some(obs) = self.observations.iter().find(|o| o.is_missing()) {
            return Err(format!("missing-value observation at {}", obs.date));
        }
        Ok(())
    }
}

/// Reject identifiers that are empty or could escape the cache directory.
pub fn validate_series_id(series_id: &str) -> Result<(), FetchError> {
    if series_id.is_empty() {
        return Err(FetchError::InvalidRequest("series id is empty".into()));
    }
    if !series_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(FetchError::InvalidRequest(format!(
            "series id '{series_id}' contains unsupported characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn obs(date: &str, value: &str) -> Observation {
        Observation::new(NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(), value)
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn new_filters_missing_and_counts() {
        let result = SeriesResult::new(
            "SLOAS",
            ts(),
            vec![obs("2020-01-01", "5.0"), obs("2020-02-01", "."), obs("2020-03-01", "5.2")],
        );
        assert_eq!(result.count(), 2);
        assert_eq!(result.observations()[1].value, "5.2");
        assert!(result.validate().is_ok());
    }

    #[test]
    fn validate_catches_count_mismatch() {
        let json = r#"{"series_id":"X","retrieved_at":"2024-05-01T12:00:00Z","count":3,
            "observations":[{"date":"2020-01-01","value":"1"}]}"#;
        let parsed: SeriesResult = serde_json::from_str(json).unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn validate_catches_missing_marker() {
        let json = r#"{"series_id":"X","retrieved_at":"2024-05-01T12:00:00Z","count":1,
            "observations":[{"date":"2020-01-01","value":"."}]}"#;
        let parsed: SeriesResult = serde_json::from_str(json).unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn series_id_validation() {
        assert!(validate_series_id("SLOAS").is_ok());
        assert!(validate_series_id("LNS14027662").is_ok());
        assert!(validate_series_id("DGS10_X").is_ok());
        assert!(validate_series_id("").is_err());
        assert!(validate_series_id("../etc").is_err());
        assert!(validate_series_id("A B").is_err());
    }

    #[test]
    fn serialized_shape_matches_output_contract() {
        let result = SeriesResult::new("SLOAS", ts(), vec![obs("2020-01-01", "5.0")]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["series_id"], "SLOAS");
        assert_eq!(value["count"], 1);
        assert_eq!(value["observations"][0]["date"], "2020-01-01");
        assert!(value["retrieved_at"].is_string());
    }
}
