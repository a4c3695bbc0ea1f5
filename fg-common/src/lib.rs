//! # FraudGuard Common Library
//!
//! Shared code for the FraudGuard screening crates:
//! - Scoring API request/response types
//! - Event types (ScreeningEvent) and EventBus
//! - Configuration loading
//! - Timestamp and correlation id utilities

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
