//! # Domain Types
//!
//! Core types for the room document store: the logical clock, live document
//! rows, tombstone rows, and transaction outcomes.
//!
//! ## Newtypes
//!
//! [`Clock`] wraps `u64` so that clock values cannot be confused with row
//! counts or cursor positions in function signatures. Change-feed cursors are
//! deliberately *not* `Clock`: a cursor may be `-1` ("from the beginning"),
//! so cursors travel as plain `i64`.
//!
//! ## Invariants
//!
//! - [`Clock`] is monotonically non-decreasing across all observable states
//!   and advances at most once per committed transaction.
//! - A document's `last_changed_clock` never exceeds the room clock.
//! - A tombstone's `clock` is never below the tombstone history watermark.

use std::fmt;

use serde_json::Value;

/// The room's logical clock.
///
/// Starts at 0 on a fresh room and advances by exactly 1 on the first
/// mutation of each committed transaction, regardless of how many records
/// that transaction touches. Stored as INTEGER in SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Clock(u64);

impl Clock {
    /// The clock of a freshly bootstrapped room.
    pub const ZERO: Clock = Clock(0);

    /// Creates a clock from a raw value.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw u64 value.
    pub fn as_raw(&self) -> u64 {
        self.0
    }

    /// Returns the next clock value.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Converts a SQLite INTEGER column into a clock.
    ///
    /// Negative values cannot occur in a well-formed database; they clamp to
    /// zero rather than wrapping.
    pub(crate) fn from_db(value: i64) -> Self {
        Self(value.max(0) as u64)
    }

    /// Returns the value for SQLite INTEGER storage.
    pub(crate) fn as_db(&self) -> i64 {
        self.0 as i64
    }

    /// Returns the value as a signed change-feed cursor.
    pub fn as_cursor(&self) -> i64 {
        self.0 as i64
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live document row.
///
/// `state` is the record itself, a self-describing JSON value that carries
/// its own string `id` field. The store treats it as opaque apart from that
/// key.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// The record payload.
    pub state: Value,

    /// The clock at which this record was last written.
    pub last_changed_clock: Clock,
}

/// A deletion marker.
///
/// One row per deleted record, tagged with the clock at which the deletion
/// committed. Tombstones never share an `id` with a live document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    /// The id of the deleted record.
    pub id: String,

    /// The clock at which the deletion committed.
    pub clock: Clock,
}

/// The result of a committed transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome<T> {
    /// The room clock after commit.
    pub new_clock: Clock,

    /// Whether this transaction advanced the clock.
    ///
    /// `false` exactly when the body performed no document writes or
    /// deletes; listeners fire exactly when this is `true`.
    pub did_change: bool,

    /// The value returned by the transaction body.
    pub result: T,
}
