//! Shared test helpers: a scoring service whose completions are released
//! explicitly by the test, plus request/result builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use fg_common::api::{
    BatchRecord, Decision, HealthResponse, RiskLevel, ScreeningRequest, ScreeningResult,
};
use fg_screen::{ScoringService, TransportError};
use tokio::sync::oneshot;

type Outcome = Result<ScreeningResult, TransportError>;

/// Scoring service that blocks each call until the test releases it
#[derive(Default)]
pub struct GatedScorer {
    gates: Mutex<HashMap<String, oneshot::Receiver<Outcome>>>,
    batch_results: Mutex<Option<Result<Vec<ScreeningResult>, TransportError>>>,
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

impl GatedScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gate for `correlation_id`; sending on the returned
    /// sender completes that call
    pub fn gate(&self, correlation_id: &str) -> oneshot::Sender<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap()
            .insert(correlation_id.to_string(), rx);
        tx
    }

    /// Response returned by the next `score_batch` call
    pub fn set_batch_response(&self, response: Result<Vec<ScreeningResult>, TransportError>) {
        *self.batch_results.lock().unwrap() = Some(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScoringService for GatedScorer {
    async fn score_one(&self, request: &ScreeningRequest) -> Result<ScreeningResult, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().remove(&request.correlation_id);
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(TransportError::Network("gate dropped".to_string()))),
            None => Err(TransportError::Network(format!(
                "no gate for {}",
                request.correlation_id
            ))),
        }
    }

    async fn score_batch(&self, records: &[BatchRecord]) -> Result<Vec<ScreeningResult>, TransportError> {
        self.batch_sizes.lock().unwrap().push(records.len());
        self.batch_results
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(TransportError::Network("no batch response".to_string())))
    }

    async fn health(&self) -> Result<HealthResponse, TransportError> {
        Ok(HealthResponse {
            status: "ok".to_string(),
            project: "FraudGuard".to_string(),
            version: "test".to_string(),
            model_loaded: true,
            screener_loaded: true,
        })
    }
}

/// Request with a fixed correlation id
pub fn request(correlation_id: &str) -> ScreeningRequest {
    let mut request = ScreeningRequest::new(250.0, "Jane Doe", "card_1").with_sender_country("US");
    request.correlation_id = correlation_id.to_string();
    request
}

/// Low-risk approved result for `correlation_id`
pub fn result(correlation_id: &str) -> ScreeningResult {
    scored(correlation_id, 0.12, Decision::Approve, false)
}

pub fn scored(correlation_id: &str, risk_score: f64, decision: Decision, sanctions_match: bool) -> ScreeningResult {
    let risk_level = if sanctions_match {
        RiskLevel::Critical
    } else if risk_score > 0.8 {
        RiskLevel::High
    } else if risk_score > 0.5 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };
    ScreeningResult {
        correlation_id: correlation_id.to_string(),
        risk_score,
        risk_level,
        decision,
        sanctions_match,
        sanctions_detail: None,
        feature_contributions: None,
        velocity: None,
        latency_ms: 17.0,
    }
}
