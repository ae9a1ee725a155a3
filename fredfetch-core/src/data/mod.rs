//! Series retrieval: remote client, cache, fetcher, batch orchestration

pub mod batch;
pub mod cache;
pub mod fetcher;
pub mod fred;
pub mod provider;

pub use batch::{BatchOrchestrator, BatchReport, FailureDescriptor, SeriesOutcome};
pub use cache::{
    CacheEntryInfo, CacheKey, CacheStore, ClearScope, DisabledCache, JsonFileCache, MemoryCache,
};
pub use fetcher::{normalize, SeriesFetcher};
pub use fred::{FredClient, DEFAULT_TIMEOUT, FRED_OBSERVATIONS_URL};
pub use provider::{
    DataSource, ErrorKind, FetchError, FetchProgress, LogProgress, RawObservation, RawResponse,
    RemoteClient, SilentProgress,
};
