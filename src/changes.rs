//! # Incremental Change Feed
//!
//! The change feed lets a client that last synced at clock `c` catch up with
//! everything that happened since, or learn that it cannot: deletions older
//! than the tombstone history watermark have been pruned, so a client whose
//! cursor predates the watermark is told to discard its local state and
//! re-sync from scratch.
//!
//! ## Wire form
//!
//! A batch is a sequence of tagged tuples:
//!
//! ```text
//! ["wipe_all"]          discard all local state
//! ["put", {…state…}]    store state under state.id
//! ["delete", "some:id"] remove some:id
//! ```
//!
//! `wipe_all` appears at most once per batch and, when present, first.
//! Within a batch the puts and deletes never target the same id (live
//! documents and tombstones have disjoint keyspaces), so the consumer may
//! apply them in any order.

use std::fmt;

use rusqlite::Connection;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::clock;
use crate::error::Result;

const WIPE_ALL_TAG: &str = "wipe_all";
const PUT_TAG: &str = "put";
const DELETE_TAG: &str = "delete";

/// A single element of a change batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// The consumer must discard all local state before applying the rest
    /// of the batch.
    WipeAll,

    /// The consumer stores `state` under its `id` field.
    Put(Value),

    /// The consumer removes the record with this id.
    Delete(String),
}

impl Serialize for Change {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Change::WipeAll => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(WIPE_ALL_TAG)?;
                seq.end()
            }
            Change::Put(state) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(PUT_TAG)?;
                seq.serialize_element(state)?;
                seq.end()
            }
            Change::Delete(id) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(DELETE_TAG)?;
                seq.serialize_element(id)?;
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Change {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ChangeVisitor;

        impl<'de> Visitor<'de> for ChangeVisitor {
            type Value = Change;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a tagged change tuple")
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Change, A::Error> {
                let tag: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                match tag.as_str() {
                    WIPE_ALL_TAG => Ok(Change::WipeAll),
                    PUT_TAG => {
                        let state: Value = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                        Ok(Change::Put(state))
                    }
                    DELETE_TAG => {
                        let id: String = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                        Ok(Change::Delete(id))
                    }
                    other => Err(de::Error::unknown_variant(
                        other,
                        &[WIPE_ALL_TAG, PUT_TAG, DELETE_TAG],
                    )),
                }
            }
        }

        deserializer.deserialize_seq(ChangeVisitor)
    }
}

/// Computes the change batch for a client whose cursor is `since`.
///
/// A cursor of `-1` means "from the beginning". Two degenerate cursors are
/// handled here rather than surfaced as errors:
///
/// - A cursor ahead of the room clock can only come from a corrupted client;
///   it is logged and treated as `-1`.
/// - A cursor below the tombstone history watermark predates deletions that
///   have been pruned, so the batch opens with [`Change::WipeAll`] and the
///   remainder is a full re-send. Tombstones are still enumerated after a
///   wipe; consumers tolerate the redundancy and the wire contract keeps it.
pub(crate) fn collect_changes_since(conn: &Connection, mut since: i64) -> Result<Vec<Change>> {
    let room_clock = clock::read_clock(conn)?.as_cursor();
    if since == room_clock {
        return Ok(Vec::new());
    }
    if since > room_clock {
        warn!(
            since,
            room_clock, "change cursor is ahead of the room clock, resending from the beginning"
        );
        since = -1;
    }

    let mut batch = Vec::new();

    let history_start = clock::read_history_start(conn)?.as_cursor();
    if since < history_start {
        batch.push(Change::WipeAll);
        since = -1;
    }

    let mut stmt = conn.prepare("SELECT state FROM documents WHERE lastChangedClock > ?")?;
    let states = stmt.query_map([since], |row| row.get::<_, String>(0))?;
    for state in states {
        batch.push(Change::Put(serde_json::from_str(&state?)?));
    }

    let mut stmt = conn.prepare("SELECT id FROM tombstones WHERE clock > ?")?;
    let ids = stmt.query_map([since], |row| row.get::<_, String>(0))?;
    for id in ids {
        batch.push(Change::Delete(id?));
    }

    Ok(batch)
}
