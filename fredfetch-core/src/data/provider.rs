//! Remote client trait and structured error types.
//!
//! The RemoteClient trait abstracts over the statistical data service so the
//! fetcher can run against the live FRED endpoint or a stub in tests.

use crate::domain::FetchOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One observation exactly as the service sent it (before validation/filtering).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObservation {
    pub date: String,
    pub value: String,
}

impl RawObservation {
    pub fn new(date: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            value: value.into(),
        }
    }
}

/// Successful, parsed response for one series request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub observations: Vec<RawObservation>,
}

/// Structured error types for fetch operations.
///
/// These are displayable in CLI output and recorded per identifier in a batch report.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("FRED API error: {message}")]
    Api { code: Option<i64>, message: String },

    #[error("corrupt cache entry '{key}': {reason}")]
    CorruptCacheEntry { key: String, reason: String },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Transport(_) => ErrorKind::TransportError,
            FetchError::Protocol(_) => ErrorKind::ProtocolError,
            FetchError::Api { .. } => ErrorKind::ApiError,
            FetchError::CorruptCacheEntry { .. } => ErrorKind::CorruptCacheEntry,
            FetchError::Cache(_) => ErrorKind::CacheError,
            FetchError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}

/// Failure category, stable across error message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    TransportError,
    ProtocolError,
    ApiError,
    CorruptCacheEntry,
    CacheError,
    InvalidRequest,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransportError => "TransportError",
            ErrorKind::ProtocolError => "ProtocolError",
            ErrorKind::ApiError => "ApiError",
            ErrorKind::CorruptCacheEntry => "CorruptCacheEntry",
            ErrorKind::CacheError => "CacheError",
            ErrorKind::InvalidRequest => "InvalidRequest",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a series result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Remote,
    Cache,
}

/// Trait for remote series sources.
///
/// Implementations make exactly one request per call: no retries, no caching.
/// The cache layer sits above this trait.
pub trait RemoteClient: Send + Sync {
    /// Human-readable name of this client.
    fn name(&self) -> &str;

    /// Fetch raw observations for one series.
    fn fetch(&self, series_id: &str, options: &FetchOptions) -> Result<RawResponse, FetchError>;
}

/// Progress callback for multi-series operations.
pub trait FetchProgress {
    /// Called when starting to fetch a series.
    fn on_start(&self, series_id: &str, index: usize, total: usize);

    /// Called when a series fetch completes.
    fn on_complete(
        &self,
        series_id: &str,
        index: usize,
        total: usize,
        result: &Result<DataSource, FetchError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that writes through the `log` facade.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_start(&self, series_id: &str, index: usize, total: usize) {
        log::debug!("[{}/{}] {series_id}", index + 1, total);
    }

    fn on_complete(
        &self,
        series_id: &str,
        _index: usize,
        _total: usize,
        result: &Result<DataSource, FetchError>,
    ) {
        if let Err(e) = result {
            log::error!("Error fetching {series_id}: {e}");
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        if failed > 0 {
            log::warn!("Failed to fetch {failed} series");
        }
        log::info!("Batch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Progress reporter that reports nothing.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_start(&self, _series_id: &str, _index: usize, _total: usize) {}

    fn on_complete(
        &self,
        _series_id: &str,
        _index: usize,
        _total: usize,
        _result: &Result<DataSource, FetchError>,
    ) {
    }

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
