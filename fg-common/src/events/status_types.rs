//! Screening status type definitions

use serde::{Deserialize, Serialize};

/// Visible state of the single-transaction screening view
///
/// `Idle` until the first submission. `Loading` while the current
/// submission is outstanding, then `Ready` or `Error` once its outcome
/// arrives. Selecting a history entry jumps straight to `Ready`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ScreeningStatus {
    /// Nothing submitted yet
    #[default]
    Idle,
    /// Waiting for the current submission's outcome
    Loading,
    /// A result is displayed
    Ready,
    /// The current submission failed
    Error,
}

impl std::fmt::Display for ScreeningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreeningStatus::Idle => write!(f, "Idle"),
            ScreeningStatus::Loading => write!(f, "Loading"),
            ScreeningStatus::Ready => write!(f, "Ready"),
            ScreeningStatus::Error => write!(f, "Error"),
        }
    }
}
