//! Shared screening request/response types
//!
//! Used by the request coordinator, the history store (which persists them
//! verbatim) and the batch ingestor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::uuid_utils;
use crate::{Error, Result};

/// JSON keys owned by named `ScreeningRequest` fields; extra features may not reuse them
const RESERVED_REQUEST_KEYS: &[&str] = &[
    "transaction_id",
    "TransactionAmt",
    "sender_name",
    "card_id",
    "sender_country",
    "ProductCD",
];

// ========================================
// Single transaction screening
// ========================================

/// One transaction submitted for scoring
///
/// Immutable once submitted: the coordinator keeps its own copy and the
/// history store persists exactly what was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningRequest {
    /// Unique per submission, echoed back by the backend
    #[serde(rename = "transaction_id")]
    pub correlation_id: String,

    /// Transaction amount (must be finite and positive)
    #[serde(rename = "TransactionAmt")]
    pub amount: f64,

    /// Full name of the sender (screened against sanctions lists)
    pub sender_name: String,

    /// Card identifier (used for velocity features)
    pub card_id: String,

    /// ISO country code of the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_country: Option<String>,

    /// Product code
    #[serde(rename = "ProductCD", default, skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,

    /// Additional numeric model features, sent as top-level keys
    #[serde(flatten)]
    pub extra_features: BTreeMap<String, f64>,
}

impl ScreeningRequest {
    /// Create a request with a freshly generated correlation id
    pub fn new(amount: f64, sender_name: impl Into<String>, card_id: impl Into<String>) -> Self {
        Self {
            correlation_id: uuid_utils::correlation_id(),
            amount,
            sender_name: sender_name.into(),
            card_id: card_id.into(),
            sender_country: None,
            product_code: None,
            extra_features: BTreeMap::new(),
        }
    }

    /// Set the sender country
    pub fn with_sender_country(mut self, country: impl Into<String>) -> Self {
        self.sender_country = Some(country.into());
        self
    }

    /// Set the product code
    pub fn with_product_code(mut self, code: impl Into<String>) -> Self {
        self.product_code = Some(code.into());
        self
    }

    /// Add one extra model feature
    pub fn with_feature(mut self, name: impl Into<String>, value: f64) -> Self {
        self.extra_features.insert(name.into(), value);
        self
    }

    /// Check the request before it is dispatched
    pub fn validate(&self) -> Result<()> {
        if self.correlation_id.trim().is_empty() {
            return Err(Error::InvalidInput("correlation id is empty".to_string()));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "amount must be a positive number, got {}",
                self.amount
            )));
        }
        if self.sender_name.trim().is_empty() {
            return Err(Error::InvalidInput("sender_name is required".to_string()));
        }
        if self.card_id.trim().is_empty() {
            return Err(Error::InvalidInput("card_id is required".to_string()));
        }
        for (name, value) in &self.extra_features {
            if RESERVED_REQUEST_KEYS.contains(&name.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "extra feature '{}' collides with a request field",
                    name
                )));
            }
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!(
                    "extra feature '{}' is not a finite number",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Categorical risk level computed by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommended action computed by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Review,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Review => "review",
            Decision::Reject => "reject",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One model feature and its contribution to the risk score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub name: String,
    /// Raw feature value (numeric or categorical)
    pub value: Value,
    pub contribution: f64,
}

/// Card velocity counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VelocityFeatures {
    #[serde(rename = "transactions_1h")]
    pub count_1h: u32,
    #[serde(rename = "transactions_24h")]
    pub count_24h: u32,
}

/// Scoring outcome for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    /// Matches the originating request
    #[serde(rename = "transaction_id")]
    pub correlation_id: String,

    /// Fraud probability (0.0-1.0)
    pub risk_score: f64,

    pub risk_level: RiskLevel,

    pub decision: Decision,

    pub sanctions_match: bool,

    /// Sanctions screening detail (top matches, screened name)
    #[serde(rename = "sanctions_details", default, skip_serializing_if = "Option::is_none")]
    pub sanctions_detail: Option<Value>,

    /// Ordered most-influential first
    #[serde(rename = "top_features", default, skip_serializing_if = "Option::is_none")]
    pub feature_contributions: Option<Vec<FeatureContribution>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<VelocityFeatures>,

    /// Server-side processing time in milliseconds
    pub latency_ms: f64,
}

impl ScreeningResult {
    /// Check the numeric fields the backend is expected to keep in range
    pub fn check_well_formed(&self) -> std::result::Result<(), String> {
        if !self.risk_score.is_finite() || !(0.0..=1.0).contains(&self.risk_score) {
            return Err(format!("risk_score {} outside [0, 1]", self.risk_score));
        }
        if !self.latency_ms.is_finite() || self.latency_ms < 0.0 {
            return Err(format!("latency_ms {} is not a valid duration", self.latency_ms));
        }
        Ok(())
    }
}

// ========================================
// Batch screening
// ========================================

/// One validated CSV row ready for batch scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// 1-based data row index (header excluded); local bookkeeping only
    #[serde(skip)]
    pub row_index: usize,

    pub transaction_id: String,

    pub sender_name: String,

    /// Always finite and positive
    #[serde(rename = "TransactionAmt")]
    pub amount: f64,

    pub card_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_country: Option<String>,

    #[serde(rename = "ProductCD", default, skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,
}

/// Request body for `POST /api/v1/batch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchScoreRequest {
    pub transactions: Vec<BatchRecord>,
}

/// Response body for `POST /api/v1/batch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchScoreResponse {
    pub results: Vec<ScreeningResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_latency_ms: Option<f64>,
}

// ========================================
// Health
// ========================================

/// Response body for `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub project: String,
    pub version: String,
    pub model_loaded: bool,
    pub screener_loaded: bool,
}

impl HealthResponse {
    /// Backend is up and both scoring components are loaded
    pub fn is_ready(&self) -> bool {
        self.status == "ok" && self.model_loaded && self.screener_loaded
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_result(id: &str) -> ScreeningResult {
        ScreeningResult {
            correlation_id: id.to_string(),
            risk_score: 0.42,
            risk_level: RiskLevel::Medium,
            decision: Decision::Review,
            sanctions_match: false,
            sanctions_detail: None,
            feature_contributions: None,
            velocity: None,
            latency_ms: 12.5,
        }
    }

    #[test]
    fn test_request_serializes_backend_field_names() {
        let request = ScreeningRequest::new(150.0, "Jane Doe", "card_1")
            .with_sender_country("US")
            .with_product_code("W")
            .with_feature("V258", 1.5);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["transaction_id"], json!(request.correlation_id));
        assert_eq!(value["TransactionAmt"], json!(150.0));
        assert_eq!(value["ProductCD"], json!("W"));
        assert_eq!(value["sender_country"], json!("US"));
        assert_eq!(value["V258"], json!(1.5));
        assert!(value.get("extra_features").is_none());
    }

    #[test]
    fn test_request_omits_absent_optionals() {
        let request = ScreeningRequest::new(10.0, "A", "B");
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("sender_country").is_none());
        assert!(value.get("ProductCD").is_none());
    }

    #[test]
    fn test_request_deserializes_extra_features() {
        let json = r#"{"transaction_id":"t1","TransactionAmt":5.0,"sender_name":"A",
                       "card_id":"c","C1":3.0,"V45":0.5}"#;
        let request: ScreeningRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.correlation_id, "t1");
        assert_eq!(request.extra_features.len(), 2);
        assert_eq!(request.extra_features["C1"], 3.0);
        assert!(request.sender_country.is_none());
    }

    #[test]
    fn test_request_validation() {
        assert!(ScreeningRequest::new(1.0, "A", "c").validate().is_ok());
        assert!(ScreeningRequest::new(0.0, "A", "c").validate().is_err());
        assert!(ScreeningRequest::new(-3.0, "A", "c").validate().is_err());
        assert!(ScreeningRequest::new(f64::NAN, "A", "c").validate().is_err());
        assert!(ScreeningRequest::new(1.0, "  ", "c").validate().is_err());
        assert!(ScreeningRequest::new(1.0, "A", "").validate().is_err());
        assert!(ScreeningRequest::new(1.0, "A", "c")
            .with_feature("ProductCD", 1.0)
            .validate()
            .is_err());
        assert!(ScreeningRequest::new(1.0, "A", "c")
            .with_feature("V1", f64::INFINITY)
            .validate()
            .is_err());
    }

    #[test]
    fn test_new_requests_get_distinct_ids() {
        let a = ScreeningRequest::new(1.0, "A", "c");
        let b = ScreeningRequest::new(1.0, "A", "c");
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn test_result_deserializes_backend_response() {
        let json = json!({
            "transaction_id": "TXN-9",
            "risk_score": 0.91,
            "risk_level": "critical",
            "decision": "reject",
            "sanctions_match": true,
            "sanctions_details": {"screened_name": "X", "top_matches": []},
            "top_features": [
                {"name": "TransactionAmt", "value": 9000.0, "contribution": 0.31},
                {"name": "card4", "value": "visa", "contribution": -0.02}
            ],
            "velocity": {"transactions_1h": 3, "transactions_24h": 11},
            "latency_ms": 41.7
        });

        let result: ScreeningResult = serde_json::from_value(json).unwrap();
        assert_eq!(result.correlation_id, "TXN-9");
        assert_eq!(result.risk_level, RiskLevel::Critical);
        assert_eq!(result.decision, Decision::Reject);
        let features = result.feature_contributions.unwrap();
        assert_eq!(features[0].name, "TransactionAmt");
        assert_eq!(features[1].value, json!("visa"));
        assert_eq!(result.velocity.unwrap().count_24h, 11);
    }

    #[test]
    fn test_result_optional_sections_may_be_null() {
        let json = r#"{"transaction_id":"t","risk_score":0.1,"risk_level":"low",
                       "decision":"approve","sanctions_match":false,
                       "sanctions_details":null,"latency_ms":3.0}"#;
        let result: ScreeningResult = serde_json::from_str(json).unwrap();
        assert!(result.sanctions_detail.is_none());
        assert!(result.feature_contributions.is_none());
        assert!(result.velocity.is_none());
    }

    #[test]
    fn test_result_well_formed_checks() {
        assert!(sample_result("a").check_well_formed().is_ok());

        let mut out_of_range = sample_result("a");
        out_of_range.risk_score = 1.2;
        assert!(out_of_range.check_well_formed().is_err());

        let mut negative_latency = sample_result("a");
        negative_latency.latency_ms = -1.0;
        assert!(negative_latency.check_well_formed().is_err());
    }

    #[test]
    fn test_unknown_risk_level_rejected() {
        let json = r#"{"transaction_id":"t","risk_score":0.1,"risk_level":"severe",
                       "decision":"approve","sanctions_match":false,"latency_ms":3.0}"#;
        assert!(serde_json::from_str::<ScreeningResult>(json).is_err());
    }

    #[test]
    fn test_batch_record_wire_format_skips_row_index() {
        let record = BatchRecord {
            row_index: 7,
            transaction_id: "TXN-1".to_string(),
            sender_name: "Jane".to_string(),
            amount: 20.0,
            card_id: "card_1".to_string(),
            sender_country: None,
            product_code: Some("C".to_string()),
        };
        let value = serde_json::to_value(BatchScoreRequest { transactions: vec![record] }).unwrap();
        let row = &value["transactions"][0];
        assert!(row.get("row_index").is_none());
        assert_eq!(row["TransactionAmt"], json!(20.0));
        assert_eq!(row["ProductCD"], json!("C"));
    }

    #[test]
    fn test_health_ready() {
        let health = HealthResponse {
            status: "ok".to_string(),
            project: "FraudGuard".to_string(),
            version: "1.0".to_string(),
            model_loaded: true,
            screener_loaded: false,
        };
        assert!(!health.is_ready());
    }
}
