//! FRED series-observations client.
//!
//! Fetches observations from the St. Louis Fed `fred/series/observations`
//! endpoint. One request per call with a bounded timeout; retries and caching
//! live elsewhere (or nowhere).

use super::provider::{FetchError, RawObservation, RawResponse, RemoteClient};
use crate::domain::FetchOptions;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;

/// Observations endpoint of the FRED API.
pub const FRED_OBSERVATIONS_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

/// Request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// FRED observations response. Success and error payloads share one shape.
#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Option<Vec<WireObservation>>,
    error_code: Option<i64>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireObservation {
    date: String,
    #[serde(deserialize_with = "string_or_number")]
    value: String,
}

/// FRED sends values as strings; tolerate bare numbers too.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// FRED API client.
pub struct FredClient {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl FredClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fredfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: FRED_OBSERVATIONS_URL.to_string(),
            timeout,
        })
    }

    /// Point the client at a different endpoint (local fixtures, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Query parameters for one request. Window bounds are sent only when set.
    fn query_params(&self, series_id: &str, options: &FetchOptions) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("series_id", series_id.to_string()),
            ("api_key", self.api_key.clone()),
            ("file_type", "json".to_string()),
            ("sort_order", options.sort_order.as_str().to_string()),
            ("limit", options.limit.to_string()),
        ];
        if let Some(start) = options.observation_start {
            params.push(("observation_start", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = options.observation_end {
            params.push(("observation_end", end.format("%Y-%m-%d").to_string()));
        }
        params
    }

    /// Classify a reqwest failure. The URL is stripped so the key never leaks.
    fn transport_error(&self, series_id: &str, e: reqwest::Error) -> FetchError {
        let e = e.without_url();
        if e.is_timeout() {
            FetchError::Transport(format!(
                "request for {series_id} timed out after {}s",
                self.timeout.as_secs()
            ))
        } else {
            FetchError::Transport(format!("request for {series_id} failed: {e}"))
        }
    }

    /// Turn a status + body into observations or a typed failure.
    fn parse_response(
        series_id: &str,
        status: StatusCode,
        body: &str,
    ) -> Result<RawResponse, FetchError> {
        if !status.is_success() {
            let detail = serde_json::from_str::<ObservationsResponse>(body)
                .ok()
                .and_then(|r| r.error_message);
            return Err(match detail {
                Some(msg) => FetchError::Protocol(format!("HTTP {status} for {series_id}: {msg}")),
                None => FetchError::Protocol(format!("HTTP {status} for {series_id}")),
            });
        }

        let parsed: ObservationsResponse = serde_json::from_str(body).map_err(|e| {
            FetchError::Protocol(format!("invalid JSON response for {series_id}: {e}"))
        })?;

        if parsed.error_code.is_some() || parsed.error_message.is_some() {
            return Err(FetchError::Api {
                code: parsed.error_code,
                message: parsed
                    .error_message
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        let observations = parsed
            .observations
            .unwrap_or_default()
            .into_iter()
            .map(|o| RawObservation {
                date: o.date,
                value: o.value,
            })
            .collect();

        Ok(RawResponse { observations })
    }
}

impl fmt::Debug for FredClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FredClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RemoteClient for FredClient {
    fn name(&self) -> &str {
        "fred"
    }

    fn fetch(&self, series_id: &str, options: &FetchOptions) -> Result<RawResponse, FetchError> {
        let params = self.query_params(series_id, options);

        let resp = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .map_err(|e| self.transport_error(series_id, e))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| self.transport_error(series_id, e))?;

        Self::parse_response(series_id, status, &body)
    }
}
