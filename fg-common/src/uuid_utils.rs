//! UUID and correlation id utilities

use uuid::Uuid;

/// Prefix used for generated correlation ids
pub const CORRELATION_PREFIX: &str = "txn-";

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Generate a fresh correlation id (`txn-<uuidv4>`)
///
/// Each scoring submission gets its own id, which the backend echoes back
/// as `transaction_id` on the result.
pub fn correlation_id() -> String {
    format!("{}{}", CORRELATION_PREFIX, generate().simple())
}
