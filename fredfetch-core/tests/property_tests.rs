//! Property tests for fetch pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Missing-value filtering is total and order-preserving
//! 2. Batch reports account for every distinct identifier exactly once
//! 3. Failures never leak into other identifiers' outcomes

use chrono::{NaiveDate, Utc};
use fredfetch_core::data::{
    normalize, BatchOrchestrator, ErrorKind, FetchError, MemoryCache, RawObservation,
    RawResponse, RemoteClient, SeriesFetcher,
};
use fredfetch_core::domain::FetchOptions;
use proptest::prelude::*;
use std::collections::HashSet;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_value() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(".".to_string()),
        (-1000.0..1000.0_f64).prop_map(|v| format!("{v:.2}")),
    ]
}

fn arb_observations() -> impl Strategy<Value = Vec<RawObservation>> {
    prop::collection::vec((0u32..3650, arb_value()), 0..60).prop_map(|rows| {
        let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        rows.into_iter()
            .map(|(offset, value)| {
                let date = epoch + chrono::Duration::days(offset as i64);
                RawObservation::new(date.format("%Y-%m-%d").to_string(), value)
            })
            .collect()
    })
}

fn arb_series_ids() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-E]{1,2}", 0..12)
}

/// Succeeds unless the series id starts with 'B'.
struct PickyClient;

impl RemoteClient for PickyClient {
    fn name(&self) -> &str {
        "picky"
    }

    fn fetch(&self, series_id: &str, _options: &FetchOptions) -> Result<RawResponse, FetchError> {
        if series_id.starts_with('B') {
            return Err(FetchError::Transport("connection reset".into()));
        }
        Ok(RawResponse {
            observations: vec![
                RawObservation::new("2020-01-01", "1.0"),
                RawObservation::new("2020-02-01", "."),
            ],
        })
    }
}

// ── 1. Filtering ─────────────────────────────────────────────────────

proptest! {
    /// No observation in a normalized result carries the missing marker,
    /// and survivors keep their relative order.
    #[test]
    fn filtering_is_total(raw in arb_observations()) {
        let expected: Vec<RawObservation> =
            raw.iter().filter(|o| o.value != ".").cloned().collect();

        let result = normalize("X", RawResponse { observations: raw }, Utc::now()).unwrap();

        prop_assert!(result.observations().iter().all(|o| o.value != "."));
        prop_assert_eq!(result.count(), expected.len());
        for (obs, raw) in result.observations().iter().zip(&expected) {
            prop_assert_eq!(obs.date.format("%Y-%m-%d").to_string(), raw.date.clone());
            prop_assert_eq!(&obs.value, &raw.value);
        }
    }
}

// ── 2 & 3. Batch completeness and isolation ─────────────────────────

proptest! {
    /// Every distinct id appears exactly once; 'B*' ids fail, the rest succeed.
    #[test]
    fn batch_report_is_complete_and_isolated(ids in arb_series_ids()) {
        let cache = MemoryCache::new();
        let client = PickyClient;
        let batch = BatchOrchestrator::new(SeriesFetcher::new(&client, &cache));

        let report = batch.fetch_all(ids.as_slice(), &FetchOptions::default());

        let distinct: HashSet<&str> = ids.iter().map(|s| s.as_str()).collect();
        prop_assert_eq!(report.len(), distinct.len());

        for id in &distinct {
            let outcome = report.get(id);
            prop_assert!(outcome.is_some());
            let outcome = outcome.unwrap();
            if id.starts_with('B') {
                let failure = outcome.as_failure();
                prop_assert!(failure.is_some());
                prop_assert_eq!(failure.unwrap().kind, ErrorKind::TransportError);
            } else {
                prop_assert_eq!(outcome.as_result().map(|r| r.count()), Some(1));
            }
        }
        prop_assert_eq!(
            report.succeeded_count() + report.failed_count(),
            report.len()
        );
    }
}
