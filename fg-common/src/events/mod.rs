//! Event types for the FraudGuard event system
//!
//! Provides shared event definitions and the EventBus used by the
//! presentation layer to observe coordinator and history changes.

mod status_types;

pub use status_types::ScreeningStatus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// FraudGuard event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to a UI. The request coordinator is the only producer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ScreeningEvent {
    /// Visible screening status changed
    StatusChanged {
        /// Status before change
        old_status: ScreeningStatus,
        /// Status after change
        new_status: ScreeningStatus,
        /// Correlation id the new status refers to (None after a history selection)
        correlation_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// An outcome arrived for a superseded submission and was dropped
    ResultDiscarded {
        /// Correlation id of the stale outcome
        correlation_id: String,
        /// Correlation id tracked at arrival time
        current_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A completed screening was recorded in history
    HistoryAppended {
        entry_id: String,
        /// History length after capacity enforcement
        len: usize,
        /// Entries evicted from the tail by this append
        evicted: usize,
        timestamp: DateTime<Utc>,
    },

    /// A history entry was recalled into the visible state
    HistorySelected {
        entry_id: String,
        timestamp: DateTime<Utc>,
    },

    /// History was emptied by the user
    HistoryCleared { timestamp: DateTime<Utc> },
}

impl ScreeningEvent {
    /// Event type name (matches the serialized `type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            ScreeningEvent::StatusChanged { .. } => "StatusChanged",
            ScreeningEvent::ResultDiscarded { .. } => "ResultDiscarded",
            ScreeningEvent::HistoryAppended { .. } => "HistoryAppended",
            ScreeningEvent::HistorySelected { .. } => "HistorySelected",
            ScreeningEvent::HistoryCleared { .. } => "HistoryCleared",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use fg_common::events::{EventBus, ScreeningEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(ScreeningEvent::HistoryCleared {
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "HistoryCleared");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScreeningEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ScreeningEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ScreeningEvent,
    ) -> Result<usize, broadcast::error::SendError<ScreeningEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ScreeningEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
