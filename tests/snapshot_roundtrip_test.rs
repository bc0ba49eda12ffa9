//! Snapshot ingestion and export: seeding reproduces the snapshot exactly,
//! and exporting a seeded room gives the snapshot back.

mod common;

use roomdb::{DocumentStore, RoomSnapshot};
use rusqlite::Connection;

fn store_from(snapshot: RoomSnapshot) -> DocumentStore {
    let conn = Connection::open_in_memory().unwrap();
    DocumentStore::new(conn, Some(snapshot)).unwrap()
}

#[test]
fn seeded_room_round_trips_to_the_same_snapshot() {
    let seed = common::seed_snapshot();
    let store = store_from(seed.clone());

    let exported = store.to_snapshot().unwrap();
    assert_eq!(common::normalized(exported), common::normalized(seed));
}

#[test]
fn seeded_state_is_readable_through_transactions() {
    let mut store = store_from(common::seed_snapshot());

    let (doc, tombstones) = store
        .transaction("inspect", |txn| {
            Ok((txn.get_document("r:1")?, txn.tombstones()?))
        })
        .unwrap()
        .result;

    let doc = doc.expect("seeded document present");
    assert_eq!(doc.state, common::record("r:1", "a"));
    assert_eq!(doc.last_changed_clock.as_raw(), 9);

    assert_eq!(tombstones.len(), 1);
    assert_eq!(tombstones[0].id, "r:gone");
    assert_eq!(tombstones[0].clock.as_raw(), 11);
}

#[test]
fn legacy_snapshot_json_seeds_correctly() {
    let legacy: RoomSnapshot = serde_json::from_value(serde_json::json!({
        "clock": 7,
        "documents": [
            { "state": { "id": "r:1", "n": "a" }, "lastChangedClock": 7 }
        ],
        "schema": { "schemaVersion": 1 }
    }))
    .unwrap();

    let store = store_from(legacy);
    assert_eq!(store.clock().unwrap().as_raw(), 7);
    // No explicit watermark in the legacy form: it defaults to the clock.
    assert_eq!(store.tombstone_history_start().unwrap().as_raw(), 7);
}

#[test]
fn exported_snapshot_seeds_an_identical_room() {
    let mut original = common::open_store();
    common::put(&mut original, "r:1", "a");
    common::put(&mut original, "r:2", "b");
    common::delete(&mut original, "r:1");
    original
        .transaction("meta", |txn| {
            txn.set_metadata(roomdb::SCHEMA_METADATA_KEY, "{\"schemaVersion\":3}")
        })
        .unwrap();

    let exported = original.to_snapshot().unwrap();
    let copy = store_from(exported.clone());

    assert_eq!(copy.clock().unwrap(), original.clock().unwrap());
    assert_eq!(
        common::normalized(copy.to_snapshot().unwrap()),
        common::normalized(exported)
    );
}

#[test]
fn a_room_without_schema_metadata_exports_null_schema() {
    let store = common::open_store();
    let exported = store.to_snapshot().unwrap();
    assert_eq!(exported.schema, serde_json::Value::Null);
    assert_eq!(exported.document_clock, Some(0));
    assert!(exported.documents.is_empty());
    assert!(exported.tombstones.is_empty());
}
