//! # Transaction Handle
//!
//! [`StoreTxn`] is what a transaction body receives. Every operation issues
//! its SQL immediately inside the enclosing atomic scope (nothing is
//! buffered), so reads within the same transaction always observe earlier
//! writes.
//!
//! ## Clock discipline
//!
//! The first write or delete advances the room clock by one; every further
//! mutation in the same transaction reuses the advanced value. Metadata
//! writes and all reads leave the clock alone.

use rusqlite::{params, OptionalExtension, Transaction};
use serde_json::Value;

use crate::changes::{self, Change};
use crate::clock;
use crate::error::Result;
use crate::types::{Clock, Document, Tombstone};

/// Handle to an open store transaction.
///
/// Only [`crate::store::DocumentStore::transaction`] constructs one; it
/// lives for the duration of the body closure.
pub struct StoreTxn<'a> {
    tx: &'a Transaction<'a>,
    did_advance_clock: bool,
    prune_requested: bool,
}

impl<'a> StoreTxn<'a> {
    pub(crate) fn new(tx: &'a Transaction<'a>) -> Self {
        Self {
            tx,
            did_advance_clock: false,
            prune_requested: false,
        }
    }

    pub(crate) fn prune_requested(&self) -> bool {
        self.prune_requested
    }

    /// Advances the room clock if this transaction has not yet done so, and
    /// returns the clock every mutation in this transaction is tagged with.
    fn mutation_clock(&mut self) -> Result<Clock> {
        if !self.did_advance_clock {
            clock::advance_clock(self.tx)?;
            self.did_advance_clock = true;
        }
        clock::read_clock(self.tx)
    }

    /// The current room clock, including this transaction's own advance.
    pub fn clock(&self) -> Result<Clock> {
        clock::read_clock(self.tx)
    }

    /// Looks up a single document.
    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = self
            .tx
            .query_row(
                "SELECT state, lastChangedClock FROM documents WHERE id = ?",
                [id],
                |row| {
                    let state: String = row.get(0)?;
                    let last_changed: i64 = row.get(1)?;
                    Ok((state, last_changed))
                },
            )
            .optional()?;

        match row {
            Some((state, last_changed)) => Ok(Some(Document {
                state: serde_json::from_str(&state)?,
                last_changed_clock: Clock::from_db(last_changed),
            })),
            None => Ok(None),
        }
    }

    /// Upserts a document.
    ///
    /// Tags the row with this transaction's mutation clock and removes any
    /// tombstone for the id: a live document and a tombstone never share an
    /// id.
    pub fn set_document(&mut self, id: &str, state: &Value) -> Result<()> {
        let mutation_clock = self.mutation_clock()?;
        let serialized = serde_json::to_string(state)?;
        self.tx.execute(
            "INSERT INTO documents (id, state, lastChangedClock) VALUES (?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 state = excluded.state,
                 lastChangedClock = excluded.lastChangedClock",
            params![id, serialized, mutation_clock.as_db()],
        )?;
        self.tx
            .execute("DELETE FROM tombstones WHERE id = ?", [id])?;
        Ok(())
    }

    /// Deletes a document, leaving a tombstone at the mutation clock.
    ///
    /// Deleting an id with no live document still writes the tombstone
    /// (the caller may be racing a client that never saw the record), and
    /// every delete requests a deferred prune of the tombstone table.
    pub fn delete_document(&mut self, id: &str) -> Result<()> {
        let mutation_clock = self.mutation_clock()?;
        self.tx
            .execute("DELETE FROM documents WHERE id = ?", [id])?;
        self.tx.execute(
            "INSERT INTO tombstones (id, clock) VALUES (?, ?)
             ON CONFLICT (id) DO UPDATE SET clock = excluded.clock",
            params![id, mutation_clock.as_db()],
        )?;
        self.prune_requested = true;
        Ok(())
    }

    /// All live documents with their ids.
    ///
    /// Rows are materialized at call time; iteration order is unspecified
    /// and mutations made after the call are not reflected in the returned
    /// sequence.
    pub fn documents(&self) -> Result<Vec<(String, Document)>> {
        let mut stmt = self
            .tx
            .prepare("SELECT id, state, lastChangedClock FROM documents")?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let state: String = row.get(1)?;
            let last_changed: i64 = row.get(2)?;
            Ok((id, state, last_changed))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, state, last_changed) = row?;
            documents.push((
                id,
                Document {
                    state: serde_json::from_str(&state)?,
                    last_changed_clock: Clock::from_db(last_changed),
                },
            ));
        }
        Ok(documents)
    }

    /// All live document ids.
    pub fn document_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.tx.prepare("SELECT id FROM documents")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// All remembered deletions.
    pub fn tombstones(&self) -> Result<Vec<Tombstone>> {
        let mut stmt = self.tx.prepare("SELECT id, clock FROM tombstones")?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let clock: i64 = row.get(1)?;
            Ok(Tombstone {
                id,
                clock: Clock::from_db(clock),
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Reads a metadata value. No clock effect.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        self.tx
            .query_row("SELECT value FROM metadata WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    /// Writes a metadata value. No clock effect.
    pub fn set_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        self.tx.execute(
            "INSERT INTO metadata (key, value) VALUES (?, ?)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// The incremental change batch for a client cursored at `since`.
    ///
    /// `-1` means "from the beginning"; see [`crate::changes`] for the
    /// degenerate-cursor handling.
    pub fn changes_since(&self, since: i64) -> Result<Vec<Change>> {
        changes::collect_changes_since(self.tx, since)
    }
}
