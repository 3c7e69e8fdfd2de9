// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client for the Financial Modeling Prep income statement API.

use crate::config::Config;
use crate::types::Dataset;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Upstream failures.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Upstream request failed: {0}")]
    Request(String),

    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upstream returned an unexpected body: {0}")]
    Shape(String),
}

/// Fetches the income statement dataset.
#[derive(Clone)]
pub struct UpstreamClient {
    base_url: String,
    symbol: String,
    api_key: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl UpstreamClient {
    /// Create a new client from the server configuration.
    pub fn new(config: &Config) -> Result<Self, UpstreamError> {
        let timeout = Duration::from_secs(config.upstream_timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("statement-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Request(format!("Client setup failed: {e}")))?;

        Ok(Self {
            base_url: config.upstream_base_url.clone(),
            symbol: config.symbol.clone(),
            api_key: config.api_key.clone(),
            timeout,
            http,
        })
    }

    /// Statement endpoint without the key, safe to log.
    pub fn endpoint(&self) -> String {
        format!("{}/income-statement/{}", self.base_url, self.symbol)
    }

    /// Fetch annual income statements in upstream order.
    pub async fn fetch_annual(&self) -> Result<Dataset, UpstreamError> {
        let start = Instant::now();
        let endpoint = self.endpoint();

        let resp = self
            .http
            .get(&endpoint)
            .query(&[("period", "annual"), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        let body = resp.bytes().await.map_err(|e| self.request_error(e))?;
        let dataset = parse_dataset(&body)?;

        tracing::info!(
            endpoint = %endpoint,
            records = dataset.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched upstream dataset"
        );

        Ok(dataset)
    }

    fn request_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            // Strip the URL, it carries the API key.
            UpstreamError::Request(err.without_url().to_string())
        }
    }
}

/// Parse an upstream body into records.
///
/// The API reports some failures (bad key, exhausted quota) as a JSON object
/// with status 200, so anything but an array of objects is rejected.
pub fn parse_dataset(body: &[u8]) -> Result<Dataset, UpstreamError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| UpstreamError::Shape(format!("invalid JSON: {e}")))?;

    match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)
            .map_err(|e| UpstreamError::Shape(format!("expected an array of records: {e}"))),
        serde_json::Value::Object(map) => {
            let message = map
                .get("Error Message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| "object instead of array".to_string());
            Err(UpstreamError::Shape(message))
        }
        other => Err(UpstreamError::Shape(format!(
            "expected an array, got {}",
            truncate(&other.to_string(), 80)
        ))),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
