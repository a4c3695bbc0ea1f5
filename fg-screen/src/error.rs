//! Error types for fg-screen
//!
//! One enum per failure class so callers can tell them apart:
//! - [`TransportError`]: the scoring backend call failed
//! - [`BatchError`]: CSV input rejected before any batch call is made
//! - [`StorageError`]: session storage read/write failed (logged only)

use thiserror::Error;

/// Scoring backend call failure
///
/// Surfaced to the user verbatim through the coordinator's error state.
/// Never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Connection, DNS or timeout failure
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-2xx status
    #[error("API Error: {0} {1}")]
    Api(u16, String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Response decoded but violates the result contract
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// CSV batch rejection
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    /// Header or row content could not be interpreted
    #[error("{}", format_error_message(.row, .message))]
    Format {
        /// 1-based line number in the input (header is line 1), when row-specific
        row: Option<usize>,
        message: String,
    },

    /// More valid rows than a single batch call accepts
    #[error("Batch contains {found} transactions; the limit is {limit}. Split the file into batches of at most {limit} rows.")]
    TooManyRecords { limit: usize, found: usize },

    /// No valid rows remained after parsing
    #[error("No valid transactions found in the file")]
    Empty,
}

impl BatchError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        BatchError::Format {
            row: None,
            message: message.into(),
        }
    }

    pub(crate) fn format_at(row: usize, message: impl Into<String>) -> Self {
        BatchError::Format {
            row: Some(row),
            message: message.into(),
        }
    }

    /// Line number the error refers to, if row-specific
    pub fn row(&self) -> Option<usize> {
        match self {
            BatchError::Format { row, .. } => *row,
            _ => None,
        }
    }
}

fn format_error_message(row: &Option<usize>, message: &str) -> String {
    match row {
        Some(row) => format!("Row {}: {}", row, message),
        None => message.to_string(),
    }
}

/// Session storage failure
///
/// Absorbed by the history store: logged as a warning, never returned to
/// callers, never fatal.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying file operation failed
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value would exceed the storage quota
    #[error("Storage quota exceeded: {needed} bytes needed, {quota} bytes available")]
    QuotaExceeded { needed: usize, quota: usize },

    /// Storage backend is unusable (e.g. poisoned lock)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}
