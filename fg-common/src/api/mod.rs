//! Scoring API types
//!
//! Request/response bodies exchanged with the scoring backend. The JSON
//! field names follow the backend's schema (`transaction_id`,
//! `TransactionAmt`, `ProductCD`, `top_features`, ...), while the Rust
//! field names follow the screening domain.

pub mod types;

pub use types::{
    BatchRecord, BatchScoreRequest, BatchScoreResponse, Decision, FeatureContribution,
    HealthResponse, RiskLevel, ScreeningRequest, ScreeningResult, VelocityFeatures,
};
