//! Domain types for FRED series retrieval

pub mod observation;
pub mod options;
pub mod series;

pub use observation::{Observation, MISSING_VALUE};
pub use options::{FetchOptions, SortOrder, DEFAULT_LIMIT};
pub use series::{validate_series_id, SeriesResult};
