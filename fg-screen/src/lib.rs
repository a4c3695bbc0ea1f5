//! fg-screen library - payment screening orchestration
//!
//! - [`coordinator`]: one visible outcome per user action, stale responses dropped
//! - [`history`]: bounded, session-persisted record of completed screenings
//! - [`batch`]: CSV validation and bulk scoring
//! - [`client`]: scoring backend interface and HTTP implementation
//! - [`storage`]: session key/value storage backends

pub mod batch;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod history;
pub mod storage;

pub use client::{HttpScoringClient, ScoringService};
pub use coordinator::{Arrival, CoordinatorView, RequestCoordinator};
pub use error::{BatchError, StorageError, TransportError};
pub use history::{HistoryEntry, HistoryStore, HistoryView};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
