//! Scoring backend client
//!
//! The coordinator and batch flow talk to the backend only through the
//! [`ScoringService`] trait; [`HttpScoringClient`] is the production
//! implementation over HTTP/JSON.

use async_trait::async_trait;
use fg_common::api::{
    BatchRecord, BatchScoreRequest, BatchScoreResponse, HealthResponse, ScreeningRequest,
    ScreeningResult,
};
use fg_common::config::ScreenConfig;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::TransportError;

const USER_AGENT: &str = concat!("fg-screen/", env!("CARGO_PKG_VERSION"));

/// External scoring collaborator
///
/// No timeout or retry contract is assumed by callers.
#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Score one transaction
    async fn score_one(&self, request: &ScreeningRequest) -> Result<ScreeningResult, TransportError>;

    /// Score up to 100 records in one call; results carry each record's `transaction_id`
    async fn score_batch(&self, records: &[BatchRecord]) -> Result<Vec<ScreeningResult>, TransportError>;

    /// Backend liveness and model status
    async fn health(&self) -> Result<HealthResponse, TransportError>;
}

/// HTTP/JSON scoring client
#[derive(Debug, Clone)]
pub struct HttpScoringClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpScoringClient {
    /// Create a client for `base_url` (no trailing slash)
    ///
    /// `timeout` of `None` leaves calls unbounded.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ScreenConfig) -> Result<Self, TransportError> {
        Self::new(config.api_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransportError::Api(status.as_u16(), error_text));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| TransportError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ScoringService for HttpScoringClient {
    async fn score_one(&self, request: &ScreeningRequest) -> Result<ScreeningResult, TransportError> {
        let url = self.url("/api/v1/score");
        debug!(correlation_id = %request.correlation_id, url = %url, "Scoring transaction");

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Self::decode(response).await
    }

    async fn score_batch(&self, records: &[BatchRecord]) -> Result<Vec<ScreeningResult>, TransportError> {
        let url = self.url("/api/v1/batch");
        debug!(count = records.len(), url = %url, "Scoring batch");

        let body = BatchScoreRequest {
            transactions: records.to_vec(),
        };
        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let decoded: BatchScoreResponse = Self::decode(response).await?;
        if let Some(total) = decoded.total_latency_ms {
            debug!(count = decoded.results.len(), total_latency_ms = total, "Batch scored");
        }
        Ok(decoded.results)
    }

    async fn health(&self) -> Result<HealthResponse, TransportError> {
        let url = self.url("/health");
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpScoringClient::new("http://localhost:8000/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/health"), "http://localhost:8000/health");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let client = HttpScoringClient::new("http://127.0.0.1:9", Some(Duration::from_secs(2))).unwrap();
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }
}
