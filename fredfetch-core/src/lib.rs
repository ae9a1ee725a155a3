//! fredfetch core — retrieval of FRED economic time series.
//!
//! This crate contains:
//! - Domain types (observations, fetch options, series results)
//! - Cache stores (JSON files on disk, in-memory, disabled)
//! - The FRED remote client (one blocking request, bounded timeout)
//! - The read-through series fetcher with missing-value filtering
//! - The batch orchestrator with per-series failure isolation
//! - The batch configuration file model

pub mod config;
pub mod data;
pub mod domain;

pub use config::{resolve_api_key, ConfigError, FetchConfig};
pub use data::{
    BatchOrchestrator, BatchReport, CacheKey, CacheStore, ClearScope, FetchError, FredClient,
    JsonFileCache, SeriesFetcher,
};
pub use domain::{FetchOptions, Observation, SeriesResult, SortOrder};
