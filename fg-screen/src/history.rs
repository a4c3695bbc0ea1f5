//! Screening history
//!
//! Bounded, most-recent-first record of completed screenings, mirrored to
//! session storage after every mutation. Storage failures are logged and
//! absorbed: the in-memory list keeps working for the rest of the session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fg_common::api::{ScreeningRequest, ScreeningResult};
use fg_common::config::DEFAULT_HISTORY_CAPACITY;
use fg_common::time;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::storage::SessionStorage;

/// Storage key holding the JSON array of history entries
pub const HISTORY_STORAGE_KEY: &str = "fraudguard.history";

/// One completed screening
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Equal to `result.correlation_id`
    pub id: String,
    pub request: ScreeningRequest,
    pub result: ScreeningResult,
    /// Serialized as ISO-8601
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Entry for a result that just arrived
    pub fn new(request: ScreeningRequest, result: ScreeningResult) -> Self {
        Self {
            id: result.correlation_id.clone(),
            request,
            result,
            created_at: time::now(),
        }
    }
}

/// Snapshot of the history for presentation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryView {
    /// Most recent first
    pub entries: Vec<HistoryEntry>,
    pub selected_id: Option<String>,
}

/// Bounded history of completed screenings
///
/// `append` is the only operation that grows the list and it enforces the
/// capacity before returning, so the list never exceeds it.
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
    capacity: usize,
    selected_id: Option<String>,
    storage: Arc<dyn SessionStorage>,
}

impl HistoryStore {
    /// Load persisted history with the default capacity
    pub fn load(storage: Arc<dyn SessionStorage>) -> Self {
        Self::load_with_capacity(storage, DEFAULT_HISTORY_CAPACITY)
    }

    /// Load persisted history
    ///
    /// Entries with missing fields or unparsable timestamps are dropped, as
    /// are repeated ids. A capacity of 0 is treated as 1.
    pub fn load_with_capacity(storage: Arc<dyn SessionStorage>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = read_persisted(storage.as_ref());
        if entries.len() > capacity {
            debug!(
                "Persisted history has {} entries, keeping newest {}",
                entries.len(),
                capacity
            );
            entries.truncate(capacity);
        }

        Self {
            entries,
            capacity,
            selected_id: None,
            storage,
        }
    }

    /// Insert at the head, evicting from the tail beyond capacity
    ///
    /// An existing entry with the same id is replaced so ids stay unique.
    /// Returns the number of entries evicted for capacity.
    pub fn append(&mut self, entry: HistoryEntry) -> usize {
        if let Some(pos) = self.entries.iter().position(|e| e.id == entry.id) {
            warn!("History already contains {}, replacing it", entry.id);
            self.entries.remove(pos);
        }

        self.entries.insert(0, entry);

        let evicted = self.entries.len().saturating_sub(self.capacity);
        if evicted > 0 {
            for dropped in self.entries.drain(self.capacity..) {
                debug!("Evicting history entry {}", dropped.id);
                if self.selected_id.as_deref() == Some(dropped.id.as_str()) {
                    self.selected_id = None;
                }
            }
        }

        self.persist();
        evicted
    }

    /// Remove every entry and the persisted copy
    pub fn clear(&mut self) {
        self.entries.clear();
        self.selected_id = None;
        if let Err(e) = self.storage.remove(HISTORY_STORAGE_KEY) {
            warn!("Failed to remove persisted history: {}", e);
        }
    }

    /// Mark an entry as selected; returns it if present
    pub fn select(&mut self, id: &str) -> Option<&HistoryEntry> {
        let entry = self.entries.iter().find(|e| e.id == id)?;
        self.selected_id = Some(entry.id.clone());
        Some(entry)
    }

    pub(crate) fn set_selected(&mut self, id: Option<String>) {
        self.selected_id = id;
    }

    pub fn get(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Entries, most recent first
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn view(&self) -> HistoryView {
        HistoryView {
            entries: self.entries.clone(),
            selected_id: self.selected_id.clone(),
        }
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.entries) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize history: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(HISTORY_STORAGE_KEY, &json) {
            warn!("Failed to persist history ({} entries): {}", self.entries.len(), e);
        }
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("selected_id", &self.selected_id)
            .finish()
    }
}

fn read_persisted(storage: &dyn SessionStorage) -> Vec<HistoryEntry> {
    let raw = match storage.get(HISTORY_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("Failed to read persisted history: {}", e);
            return Vec::new();
        }
    };

    let items: Vec<Value> = match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            warn!("Persisted history is not a JSON array, starting empty: {}", e);
            return Vec::new();
        }
    };

    let total = items.len();
    let mut entries: Vec<HistoryEntry> = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<HistoryEntry>(item) {
            Ok(entry) if entries.iter().any(|e| e.id == entry.id) => {
                debug!("Dropping repeated history id {} at index {}", entry.id, index);
            }
            Ok(entry) => entries.push(entry),
            Err(e) => debug!("Dropping history entry at index {}: {}", index, e),
        }
    }

    if entries.len() < total {
        warn!(
            "Dropped {} unreadable history entries of {}",
            total - entries.len(),
            total
        );
    }
    entries
}
