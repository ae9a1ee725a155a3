//! Batch orchestrator — fetches many series with per-series failure isolation.

use super::fetcher::SeriesFetcher;
use super::provider::{DataSource, ErrorKind, FetchError, FetchProgress, SilentProgress};
use crate::domain::{FetchOptions, SeriesResult};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

/// Why one series failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDescriptor {
    #[serde(rename = "error")]
    pub message: String,
    pub kind: ErrorKind,
}

impl From<&FetchError> for FailureDescriptor {
    fn from(err: &FetchError) -> Self {
        Self {
            message: err.to_string(),
            kind: err.kind(),
        }
    }
}

/// Outcome for one identifier. Serializes as the result itself or as
/// `{"error": "...", "kind": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesOutcome {
    Success(SeriesResult),
    Failure(FailureDescriptor),
}

impl SeriesOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SeriesOutcome::Success(_))
    }

    pub fn as_result(&self) -> Option<&SeriesResult> {
        match self {
            SeriesOutcome::Success(r) => Some(r),
            SeriesOutcome::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&FailureDescriptor> {
        match self {
            SeriesOutcome::Success(_) => None,
            SeriesOutcome::Failure(f) => Some(f),
        }
    }
}

/// Identifier → outcome, one entry per distinct identifier.
///
/// Entries keep the position of the first occurrence of their identifier;
/// a later outcome for the same identifier replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    entries: Vec<(String, SeriesOutcome)>,
    index: HashMap<String, usize>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome (last write wins for duplicates).
    pub fn insert(&mut self, series_id: impl Into<String>, outcome: SeriesOutcome) {
        let series_id = series_id.into();
        match self.index.get(&series_id) {
            Some(&i) => self.entries[i].1 = outcome,
            None => {
                self.index.insert(series_id.clone(), self.entries.len());
                self.entries.push((series_id, outcome));
            }
        }
    }

    pub fn get(&self, series_id: &str) -> Option<&SeriesOutcome> {
        self.index.get(series_id).map(|&i| &self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SeriesOutcome)> {
        self.entries.iter().map(|(id, o)| (id.as_str(), o))
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &SeriesResult)> {
        self.iter().filter_map(|(id, o)| o.as_result().map(|r| (id, r)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &FailureDescriptor)> {
        self.iter().filter_map(|(id, o)| o.as_failure().map(|f| (id, f)))
    }

    pub fn succeeded_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0
    }
}

impl Serialize for BatchReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, outcome) in &self.entries {
            map.serialize_entry(id, outcome)?;
        }
        map.end()
    }
}

/// Drives a [`SeriesFetcher`] over a list of identifiers, one at a time.
///
/// A failure for one identifier is recorded in the report and never stops
/// the rest of the batch. Cache writes happen in input order.
pub struct BatchOrchestrator<'a> {
    fetcher: SeriesFetcher<'a>,
    progress: &'a dyn FetchProgress,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(fetcher: SeriesFetcher<'a>) -> Self {
        Self {
            fetcher,
            progress: &SilentProgress,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn FetchProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Fetch every identifier with shared options. Empty input gives an empty report.
    pub fn fetch_all<S: AsRef<str>>(&self, series_ids: &[S], options: &FetchOptions) -> BatchReport {
        let total = series_ids.len();
        let mut report = BatchReport::new();

        for (i, series_id) in series_ids.iter().enumerate() {
            let series_id = series_id.as_ref();
            self.progress.on_start(series_id, i, total);

            match self.fetcher.fetch_with_source(series_id, options) {
                Ok((result, source)) => {
                    self.progress.on_complete(series_id, i, total, &Ok(source));
                    report.insert(series_id, SeriesOutcome::Success(result));
                }
                Err(e) => {
                    let failure = FailureDescriptor::from(&e);
                    let outcome: Result<DataSource, FetchError> = Err(e);
                    self.progress.on_complete(series_id, i, total, &outcome);
                    report.insert(series_id, SeriesOutcome::Failure(failure));
                }
            }
        }

        self.progress.on_batch_complete(
            report.succeeded_count(),
            report.failed_count(),
            report.len(),
        );

        report
    }
}
