//! # Room Snapshots
//!
//! A snapshot is the self-contained serialized state of a room: every live
//! document, every remembered deletion, the record schema descriptor, and
//! both clock values. Snapshots seed a store at construction time (cold
//! migration from legacy storage) and are produced again by
//! [`crate::store::DocumentStore::to_snapshot`].
//!
//! ## Legacy field
//!
//! Older snapshots called the room clock `clock`; newer ones call it
//! `documentClock`. Deserialization accepts both via a serde alias, and
//! serialization always writes `documentClock`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Clock;

/// A document as carried inside a snapshot.
///
/// Unlike a live row, the id is not broken out: it lives inside `state` as
/// the record's `id` field and is extracted during ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    /// The record payload; must carry a string `id` field.
    pub state: Value,

    /// The clock at which this record was last written.
    pub last_changed_clock: u64,
}

/// Self-contained serialized room state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// The room clock. Older snapshots carry this as `clock`.
    #[serde(default, alias = "clock", skip_serializing_if = "Option::is_none")]
    pub document_clock: Option<u64>,

    /// The tombstone history watermark. Defaults to the resolved room clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tombstone_history_starts_at_clock: Option<u64>,

    /// Every live document.
    #[serde(default)]
    pub documents: Vec<SnapshotDocument>,

    /// Remembered deletions, keyed by record id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tombstones: BTreeMap<String, u64>,

    /// The serialized record schema descriptor.
    ///
    /// Opaque to the store; persisted verbatim under the reserved
    /// `schema` metadata key.
    pub schema: Value,
}

impl RoomSnapshot {
    /// Resolves the room clock: `documentClock`, else legacy `clock`
    /// (already folded in by the serde alias), else 0.
    pub fn resolved_document_clock(&self) -> Clock {
        Clock::from_raw(self.document_clock.unwrap_or(0))
    }

    /// Resolves the watermark, defaulting to the resolved room clock.
    pub fn resolved_history_start(&self) -> Clock {
        match self.tombstone_history_starts_at_clock {
            Some(raw) => Clock::from_raw(raw),
            None => self.resolved_document_clock(),
        }
    }
}
