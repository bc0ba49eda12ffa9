#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use roomdb::{DocumentStore, PruneConfig, RoomSnapshot, SnapshotDocument};
use rusqlite::Connection;
use serde_json::{json, Value};

pub fn open_store() -> DocumentStore {
    let conn = Connection::open_in_memory().expect("open in-memory connection");
    DocumentStore::new(conn, None).expect("bootstrap store")
}

pub fn open_store_with_config(config: PruneConfig) -> DocumentStore {
    let conn = Connection::open_in_memory().expect("open in-memory connection");
    DocumentStore::with_config(conn, None, config).expect("bootstrap store")
}

pub fn small_prune_config() -> PruneConfig {
    PruneConfig {
        max_tombstones: 20,
        prune_buffer: 5,
        debounce: Duration::from_millis(10),
    }
}

/// A minimal record: a string id plus one payload field.
pub fn record(id: &str, n: &str) -> Value {
    json!({ "id": id, "n": n })
}

/// Writes one record in its own transaction, returning the new clock.
pub fn put(store: &mut DocumentStore, id: &str, n: &str) -> u64 {
    let state = record(id, n);
    store
        .transaction("test", |txn| txn.set_document(id, &state))
        .expect("set_document transaction")
        .new_clock
        .as_raw()
}

/// Deletes one record in its own transaction, returning the new clock.
pub fn delete(store: &mut DocumentStore, id: &str) -> u64 {
    store
        .transaction("test", |txn| txn.delete_document(id))
        .expect("delete_document transaction")
        .new_clock
        .as_raw()
}

/// A snapshot with two documents, one tombstone, and explicit clocks.
pub fn seed_snapshot() -> RoomSnapshot {
    RoomSnapshot {
        document_clock: Some(12),
        tombstone_history_starts_at_clock: Some(4),
        documents: vec![
            SnapshotDocument {
                state: record("r:1", "a"),
                last_changed_clock: 9,
            },
            SnapshotDocument {
                state: record("r:2", "b"),
                last_changed_clock: 12,
            },
        ],
        tombstones: BTreeMap::from([("r:gone".to_string(), 11)]),
        schema: json!({ "schemaVersion": 2, "sequences": {} }),
    }
}

/// Normalizes a snapshot for comparison: document order is unspecified on
/// export, so sort by id.
pub fn normalized(mut snapshot: RoomSnapshot) -> RoomSnapshot {
    snapshot
        .documents
        .sort_by_key(|document| document.state["id"].as_str().map(str::to_string));
    snapshot
}
