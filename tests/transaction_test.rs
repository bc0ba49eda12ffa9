//! Transaction semantics: one clock tick per transaction, read-your-writes,
//! tombstone bookkeeping, rollback, and no-op detection.

mod common;

use roomdb::Error;

#[test]
fn upsert_then_read_back() {
    let mut store = common::open_store();

    let state = common::record("r:1", "a");
    let outcome = store
        .transaction("seed", |txn| txn.set_document("r:1", &state))
        .unwrap();
    assert_eq!(outcome.new_clock.as_raw(), 1);
    assert!(outcome.did_change);

    let document = store
        .transaction("read", |txn| txn.get_document("r:1"))
        .unwrap()
        .result
        .expect("document exists");
    assert_eq!(document.state, state);
    assert_eq!(document.last_changed_clock.as_raw(), 1);
}

#[test]
fn delete_leaves_a_tombstone() {
    let mut store = common::open_store();
    common::put(&mut store, "r:1", "a");

    let clock = common::delete(&mut store, "r:1");
    assert_eq!(clock, 2);

    let (ids, tombstones) = store
        .transaction("inspect", |txn| Ok((txn.document_ids()?, txn.tombstones()?)))
        .unwrap()
        .result;
    assert!(ids.is_empty());
    assert_eq!(tombstones.len(), 1);
    assert_eq!(tombstones[0].id, "r:1");
    assert_eq!(tombstones[0].clock.as_raw(), 2);
}

#[test]
fn deleting_an_unknown_id_still_writes_a_tombstone() {
    let mut store = common::open_store();

    let outcome = store
        .transaction("del", |txn| txn.delete_document("r:never-existed"))
        .unwrap();
    assert!(outcome.did_change);
    assert_eq!(outcome.new_clock.as_raw(), 1);

    let tombstones = store
        .transaction("inspect", |txn| txn.tombstones())
        .unwrap()
        .result;
    assert_eq!(tombstones.len(), 1);
    assert_eq!(tombstones[0].id, "r:never-existed");
}

#[test]
fn rewriting_a_deleted_id_clears_its_tombstone() {
    let mut store = common::open_store();
    common::put(&mut store, "r:1", "a");
    common::delete(&mut store, "r:1");

    common::put(&mut store, "r:1", "b");

    let (document, tombstones) = store
        .transaction("inspect", |txn| {
            Ok((txn.get_document("r:1")?, txn.tombstones()?))
        })
        .unwrap()
        .result;
    assert_eq!(document.unwrap().last_changed_clock.as_raw(), 3);
    assert!(tombstones.is_empty(), "live id must not keep a tombstone");
}

#[test]
fn many_mutations_one_clock_tick() {
    let mut store = common::open_store();

    let outcome = store
        .transaction("burst", |txn| {
            for i in 0..10 {
                let id = format!("r:{i}");
                txn.set_document(&id, &common::record(&id, "x"))?;
            }
            txn.delete_document("r:3")?;
            txn.delete_document("r:7")?;
            Ok(())
        })
        .unwrap();

    assert_eq!(outcome.new_clock.as_raw(), 1);

    let (documents, tombstones) = store
        .transaction("inspect", |txn| Ok((txn.documents()?, txn.tombstones()?)))
        .unwrap()
        .result;
    assert_eq!(documents.len(), 8);
    assert!(documents
        .iter()
        .all(|(_, document)| document.last_changed_clock.as_raw() == 1));
    assert!(tombstones
        .iter()
        .all(|tombstone| tombstone.clock.as_raw() == 1));
}

#[test]
fn reads_observe_writes_in_the_same_transaction() {
    let mut store = common::open_store();

    let seen = store
        .transaction("rw", |txn| {
            txn.set_document("r:1", &common::record("r:1", "a"))?;
            txn.get_document("r:1")
        })
        .unwrap()
        .result;
    assert_eq!(seen.unwrap().state, common::record("r:1", "a"));
}

#[test]
fn noop_transaction_leaves_the_clock_alone() {
    let mut store = common::open_store();
    common::put(&mut store, "r:1", "a");

    let outcome = store
        .transaction("noop", |txn| txn.get_document("r:1"))
        .unwrap();
    assert!(!outcome.did_change);
    assert_eq!(outcome.new_clock.as_raw(), 1);
    assert_eq!(store.clock().unwrap().as_raw(), 1);
}

#[test]
fn metadata_writes_have_no_clock_effect() {
    let mut store = common::open_store();

    let outcome = store
        .transaction("meta", |txn| {
            txn.set_metadata("theme", "dark")?;
            txn.get_metadata("theme")
        })
        .unwrap();
    assert!(!outcome.did_change);
    assert_eq!(outcome.result.as_deref(), Some("dark"));
    assert_eq!(store.clock().unwrap().as_raw(), 0);
}

#[test]
fn failed_body_rolls_back_completely() {
    let mut store = common::open_store();
    common::put(&mut store, "r:1", "a");
    let before = store.to_snapshot().unwrap();

    let result = store.transaction("doomed", |txn| {
        txn.set_document("r:2", &common::record("r:2", "b"))?;
        txn.set_document("r:3", &common::record("r:3", "c"))?;
        Err::<(), _>(Error::Snapshot("simulated body failure".to_string()))
    });
    assert!(result.is_err());

    let after = store.to_snapshot().unwrap();
    assert_eq!(
        common::normalized(before),
        common::normalized(after),
        "rolled-back transaction must leave no trace"
    );
    assert_eq!(store.clock().unwrap().as_raw(), 1);
}

#[test]
fn clock_advances_by_at_most_one_per_transaction() {
    let mut store = common::open_store();

    let mut previous = store.clock().unwrap().as_raw();
    for i in 0..20 {
        let outcome = store
            .transaction("mixed", |txn| {
                if i % 3 == 0 {
                    txn.get_document("r:0").map(|_| ())
                } else {
                    let id = format!("r:{i}");
                    txn.set_document(&id, &common::record(&id, "x"))?;
                    txn.delete_document(&format!("r:{}", i - 1))
                }
            })
            .unwrap();
        let now = outcome.new_clock.as_raw();
        assert!(now >= previous, "clock must never go backwards");
        assert!(now <= previous + 1, "clock may tick at most once");
        previous = now;
    }
}
