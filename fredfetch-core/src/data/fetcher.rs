//! Series fetcher — cache lookup, remote fetch, validation, cache write.

use super::cache::{CacheKey, CacheStore};
use super::provider::{DataSource, FetchError, RawResponse, RemoteClient};
use crate::domain::{validate_series_id, FetchOptions, Observation, SeriesResult};
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;

/// Validate and filter a raw response into a [`SeriesResult`].
///
/// Missing-value observations are dropped; the rest keep the service's order.
/// A surviving observation with an unparseable date fails the whole response.
pub fn normalize(
    series_id: &str,
    raw: RawResponse,
    retrieved_at: DateTime<Utc>,
) -> Result<SeriesResult, FetchError> {
    let observations = raw
        .observations
        .into_iter()
        .filter(|o| o.value != crate::domain::MISSING_VALUE)
        .map(|o| {
            let date = NaiveDate::parse_from_str(&o.date, "%Y-%m-%d").map_err(|e| {
                FetchError::Protocol(format!(
                    "invalid observation date '{}' for {series_id}: {e}",
                    o.date
                ))
            })?;
            Ok(Observation::new(date, o.value))
        })
        .collect::<Result<Vec<_>, FetchError>>()?;

    Ok(SeriesResult::new(series_id, retrieved_at, observations))
}

/// Stateless read-through fetcher over a cache and a remote client.
///
/// Cache hits are trusted indefinitely unless a TTL is set with
/// [`SeriesFetcher::with_ttl`].
pub struct SeriesFetcher<'a> {
    client: &'a dyn RemoteClient,
    cache: &'a dyn CacheStore,
    ttl: Option<Duration>,
}

impl<'a> SeriesFetcher<'a> {
    pub fn new(client: &'a dyn RemoteClient, cache: &'a dyn CacheStore) -> Self {
        Self {
            client,
            cache,
            ttl: None,
        }
    }

    /// Treat cache entries older than `ttl` as misses.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Fetch one series.
    pub fn fetch(&self, series_id: &str, options: &FetchOptions) -> Result<SeriesResult, FetchError> {
        self.fetch_with_source(series_id, options)
            .map(|(result, _)| result)
    }

    /// Fetch one series, also reporting whether it came from cache.
    pub fn fetch_with_source(
        &self,
        series_id: &str,
        options: &FetchOptions,
    ) -> Result<(SeriesResult, DataSource), FetchError> {
        validate_series_id(series_id)?;
        options.validate()?;

        let key = CacheKey::new(series_id, options);

        if self.cache.exists(&key) {
            let cached = self.cache.read(&key)?;
            if self.is_fresh(&cached) {
                log::info!("Loading {series_id} from cache...");
                return Ok((cached, DataSource::Cache));
            }
            log::info!(
                "Cached {series_id} retrieved at {} is past its TTL, refetching",
                cached.retrieved_at()
            );
        }

        log::info!("Fetching {series_id} from {}...", self.client.name());
        let raw = self.client.fetch(series_id, options)?;
        let result = normalize(series_id, raw, Utc::now())?;

        self.cache.write(&key, &result)?;
        log::debug!("{series_id}: {} valid observations", result.count());

        Ok((result, DataSource::Remote))
    }

    fn is_fresh(&self, cached: &SeriesResult) -> bool {
        let Some(ttl) = self.ttl else {
            return true;
        };
        // Entries stamped in the future count as fresh
        match (Utc::now() - cached.retrieved_at()).to_std() {
            Ok(age) => age <= ttl,
            Err(_) => true,
        }
    }
}
