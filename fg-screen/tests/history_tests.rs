//! Integration tests for history persistence
//!
//! Tests cover:
//! - Round-trip through directory-backed session storage
//! - Tolerance of corrupt or partially corrupt persisted data
//! - Storage failures absorbed without losing in-memory history

mod helpers;

use std::sync::Arc;

use fg_screen::history::HISTORY_STORAGE_KEY;
use fg_screen::{FileStorage, HistoryEntry, HistoryStore, MemoryStorage, SessionStorage};
use helpers::{request, result};
use tempfile::TempDir;

fn entry(id: &str) -> HistoryEntry {
    HistoryEntry::new(request(id), result(id))
}

fn ids(store: &HistoryStore) -> Vec<String> {
    store.entries().iter().map(|e| e.id.clone()).collect()
}

#[test]
fn test_file_storage_round_trip_preserves_entries() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::open(dir.path().join("session")).unwrap());

    let mut store = HistoryStore::load(storage.clone());
    let mut with_features = request("t-3");
    with_features.extra_features.insert("V258".to_string(), 1.5);
    store.append(entry("t-1"));
    store.append(entry("t-2"));
    store.append(HistoryEntry::new(with_features, result("t-3")));
    let before = store.entries().to_vec();

    let reloaded = HistoryStore::load(Arc::new(FileStorage::open(dir.path().join("session")).unwrap()));
    assert_eq!(reloaded.entries(), before.as_slice());
    assert_eq!(ids(&reloaded), vec!["t-3", "t-2", "t-1"]);
    assert_eq!(reloaded.entries()[0].request.extra_features.get("V258"), Some(&1.5));
}

#[test]
fn test_absent_key_loads_empty() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::open(dir.path()).unwrap());
    let store = HistoryStore::load(storage);
    assert!(store.is_empty());
    assert_eq!(store.selected_id(), None);
}

#[test]
fn test_created_at_persisted_as_iso8601() {
    let storage = Arc::new(MemoryStorage::new());
    let mut store = HistoryStore::load(storage.clone());
    store.append(entry("t-1"));

    let raw = storage.get(HISTORY_STORAGE_KEY).unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let created_at = json[0]["created_at"].as_str().unwrap();
    assert!(fg_common::time::parse_iso8601(created_at).is_some());
    assert_eq!(json[0]["id"], "t-1");
    assert_eq!(json[0]["result"]["transaction_id"], "t-1");
}

#[test]
fn test_corrupt_json_loads_empty_and_stays_usable() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(HISTORY_STORAGE_KEY, "{not json").unwrap();

    let mut store = HistoryStore::load(storage.clone());
    assert!(store.is_empty());

    store.append(entry("t-1"));
    assert_eq!(ids(&store), vec!["t-1"]);
    let reloaded = HistoryStore::load(storage);
    assert_eq!(ids(&reloaded), vec!["t-1"]);
}

#[test]
fn test_unreadable_entries_are_dropped() {
    let storage = Arc::new(MemoryStorage::new());
    let mut store = HistoryStore::load(storage.clone());
    store.append(entry("t-1"));
    store.append(entry("t-2"));

    let raw = storage.get(HISTORY_STORAGE_KEY).unwrap().unwrap();
    let mut json: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
    json.insert(1, serde_json::json!({ "id": "broken" }));
    let mut bad_time = json[0].clone();
    bad_time["id"] = "t-9".into();
    bad_time["created_at"] = "yesterday".into();
    json.push(bad_time);
    // Repeat of an id already kept
    json.push(json[0].clone());
    storage
        .set(HISTORY_STORAGE_KEY, &serde_json::to_string(&json).unwrap())
        .unwrap();

    let reloaded = HistoryStore::load(storage);
    assert_eq!(ids(&reloaded), vec!["t-2", "t-1"]);
}

#[test]
fn test_load_truncates_to_smaller_capacity() {
    let storage = Arc::new(MemoryStorage::new());
    let mut store = HistoryStore::load(storage.clone());
    for i in 0..5 {
        store.append(entry(&format!("t-{}", i)));
    }

    let reloaded = HistoryStore::load_with_capacity(storage, 3);
    assert_eq!(ids(&reloaded), vec!["t-4", "t-3", "t-2"]);
    assert_eq!(reloaded.capacity(), 3);
}

#[test]
fn test_quota_failure_keeps_in_memory_history() {
    let storage = Arc::new(MemoryStorage::with_quota(16));
    let mut store = HistoryStore::load(storage.clone());

    store.append(entry("t-1"));
    store.append(entry("t-2"));

    assert_eq!(ids(&store), vec!["t-2", "t-1"]);
    assert!(storage.get(HISTORY_STORAGE_KEY).unwrap().is_none());
}

#[test]
fn test_clear_then_reload_is_empty() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::open(dir.path()).unwrap());
    let mut store = HistoryStore::load(storage.clone());
    store.append(entry("t-1"));
    store.clear();

    let reloaded = HistoryStore::load(storage);
    assert!(reloaded.is_empty());
}
