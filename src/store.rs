//! # The Document Store
//!
//! [`DocumentStore`] is the authoritative, persistent copy of one sync
//! room: every live record, every remembered deletion, the room metadata,
//! and the logical clock that orders it all.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       DocumentStore                          │
//! │                                                              │
//! │  transaction(source, body) ──► StoreTxn ──► SQLite           │
//! │        │                          │                          │
//! │        │ commit, clock advanced   │ first mutation bumps     │
//! │        ▼                          ▼ the room clock once      │
//! │  ChangeBus ──► listeners      PruneScheduler ──► deferred    │
//! │  (source, newClock)           tombstone trim                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store owns its SQLite connection exclusively and is single-threaded
//! by contract: the host serializes all access to a room, so there is no
//! internal locking and no concurrent transaction support.

use std::time::Instant;

use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::debug;

use crate::clock;
use crate::error::{Error, Result};
use crate::listener::{ChangeBus, ChangeNotification, ListenerGuard};
use crate::pruner::{self, PruneConfig, PruneOutcome, PruneScheduler};
use crate::schema::{self, SCHEMA_METADATA_KEY};
use crate::snapshot::{RoomSnapshot, SnapshotDocument};
use crate::txn::StoreTxn;
use crate::types::{Clock, TransactionOutcome};

/// Clock-ordered, tombstoned document store for one room.
pub struct DocumentStore {
    conn: Connection,
    listeners: ChangeBus,
    prune_config: PruneConfig,
    prune_scheduler: PruneScheduler,
}

impl DocumentStore {
    /// Opens a store over the given connection.
    ///
    /// Issues the idempotent DDL, then either retains whatever the database
    /// already holds (no snapshot) or atomically replaces all four tables
    /// with the snapshot's contents.
    pub fn new(conn: Connection, snapshot: Option<RoomSnapshot>) -> Result<Self> {
        Self::with_config(conn, snapshot, PruneConfig::default())
    }

    /// Like [`DocumentStore::new`], with explicit pruner tuning.
    pub fn with_config(
        mut conn: Connection,
        snapshot: Option<RoomSnapshot>,
        prune_config: PruneConfig,
    ) -> Result<Self> {
        schema::create_tables(&conn)?;
        match snapshot {
            Some(snapshot) => {
                ingest_snapshot(&mut conn, &snapshot)?;
                debug!(
                    documents = snapshot.documents.len(),
                    tombstones = snapshot.tombstones.len(),
                    clock = snapshot.resolved_document_clock().as_raw(),
                    "seeded room from snapshot"
                );
            }
            None => {
                clock::ensure_clock_row(&conn)?;
                debug!(
                    clock = clock::read_clock(&conn)?.as_raw(),
                    "opened room, existing data retained"
                );
            }
        }

        let prune_scheduler = PruneScheduler::new(prune_config.debounce);
        Ok(Self {
            conn,
            listeners: ChangeBus::new(),
            prune_config,
            prune_scheduler,
        })
    }

    /// The current room clock.
    pub fn clock(&self) -> Result<Clock> {
        clock::read_clock(&self.conn)
    }

    /// The clock below which tombstones have been pruned away.
    pub fn tombstone_history_start(&self) -> Result<Clock> {
        clock::read_history_start(&self.conn)
    }

    /// Runs `body` atomically.
    ///
    /// The body receives a [`StoreTxn`] whose operations hit SQLite
    /// immediately inside one atomic scope. On normal return the scope
    /// commits; if the clock advanced, every listener is then notified with
    /// `(source, new_clock)` before this call returns. If `body` returns an
    /// error the scope rolls back completely, no listener fires, and no
    /// clock change is observable.
    pub fn transaction<T>(
        &mut self,
        source: &str,
        body: impl FnOnce(&mut StoreTxn<'_>) -> Result<T>,
    ) -> Result<TransactionOutcome<T>> {
        let clock_before = clock::read_clock(&self.conn)?;

        let tx = self.conn.transaction()?;
        let mut txn = StoreTxn::new(&tx);
        let result = body(&mut txn)?;
        let new_clock = txn.clock()?;
        let prune_requested = txn.prune_requested();
        drop(txn);
        tx.commit()?;

        let did_change = new_clock > clock_before;
        if did_change {
            self.listeners.notify(&ChangeNotification {
                source: source.to_string(),
                new_clock,
            });
        }
        if prune_requested {
            self.prune_scheduler.request(Instant::now());
        }

        Ok(TransactionOutcome {
            new_clock,
            did_change,
            result,
        })
    }

    /// Registers a listener for committed, clock-advancing transactions.
    ///
    /// Listeners fire synchronously in registration order, exactly when a
    /// transaction's `did_change` is true. The returned guard's
    /// [`dispose`](ListenerGuard::dispose) is idempotent; dropping the
    /// guard leaves the listener registered.
    pub fn on_change(&self, callback: impl FnMut(&ChangeNotification) + 'static) -> ListenerGuard {
        self.listeners.on_change(callback)
    }

    /// Whether a deferred prune is waiting for its quiet window.
    pub fn prune_pending(&self) -> bool {
        self.prune_scheduler.is_pending()
    }

    /// Runs the deferred prune if its quiet window has elapsed at `now`.
    ///
    /// The host calls this from its event loop. Returns `None` when nothing
    /// was due.
    pub fn run_scheduled_prune(&mut self, now: Instant) -> Result<Option<PruneOutcome>> {
        if !self.prune_scheduler.take_due(now) {
            return Ok(None);
        }
        pruner::prune_tombstones(&mut self.conn, &self.prune_config).map(Some)
    }

    /// Prunes immediately, consuming any pending deferred request.
    pub fn prune_now(&mut self) -> Result<PruneOutcome> {
        self.prune_scheduler.clear();
        pruner::prune_tombstones(&mut self.conn, &self.prune_config)
    }

    /// Exports the room as a self-contained snapshot.
    ///
    /// Feeding the result back into [`DocumentStore::new`] reconstructs the
    /// room exactly; this is the migration path between hosts.
    pub fn to_snapshot(&self) -> Result<RoomSnapshot> {
        let documents = {
            let mut stmt = self
                .conn
                .prepare("SELECT state, lastChangedClock FROM documents")?;
            let rows = stmt.query_map([], |row| {
                let state: String = row.get(0)?;
                let last_changed: i64 = row.get(1)?;
                Ok((state, last_changed))
            })?;

            let mut documents = Vec::new();
            for row in rows {
                let (state, last_changed) = row?;
                documents.push(SnapshotDocument {
                    state: serde_json::from_str(&state)?,
                    last_changed_clock: last_changed.max(0) as u64,
                });
            }
            documents
        };

        let tombstones = {
            let mut stmt = self.conn.prepare("SELECT id, clock FROM tombstones")?;
            let rows = stmt.query_map([], |row| {
                let id: String = row.get(0)?;
                let clock: i64 = row.get(1)?;
                Ok((id, clock.max(0) as u64))
            })?;
            rows.collect::<std::result::Result<_, _>>()?
        };

        let schema = {
            let serialized: Option<String> = {
                use rusqlite::OptionalExtension;
                self.conn
                    .query_row(
                        "SELECT value FROM metadata WHERE key = ?",
                        [SCHEMA_METADATA_KEY],
                        |row| row.get(0),
                    )
                    .optional()?
            };
            match serialized {
                Some(serialized) => serde_json::from_str(&serialized)?,
                None => Value::Null,
            }
        };

        Ok(RoomSnapshot {
            document_clock: Some(self.clock()?.as_raw()),
            tombstone_history_starts_at_clock: Some(self.tombstone_history_start()?.as_raw()),
            documents,
            tombstones,
            schema,
        })
    }
}

/// Replaces all four tables with the snapshot's contents, atomically.
fn ingest_snapshot(conn: &mut Connection, snapshot: &RoomSnapshot) -> Result<()> {
    let document_clock = snapshot.resolved_document_clock();
    let history_start = snapshot.resolved_history_start();

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM documents", [])?;
    tx.execute("DELETE FROM tombstones", [])?;
    tx.execute("DELETE FROM metadata", [])?;
    tx.execute("DELETE FROM clock", [])?;

    for (index, document) in snapshot.documents.iter().enumerate() {
        let id = document
            .state
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Snapshot(format!("document {index} has no string 'id' field")))?;
        tx.execute(
            "INSERT INTO documents (id, state, lastChangedClock) VALUES (?, ?, ?)",
            params![
                id,
                serde_json::to_string(&document.state)?,
                document.last_changed_clock as i64
            ],
        )?;
    }

    for (id, clock_raw) in &snapshot.tombstones {
        tx.execute(
            "INSERT INTO tombstones (id, clock) VALUES (?, ?)",
            params![id, *clock_raw as i64],
        )?;
    }

    tx.execute(
        "INSERT INTO metadata (key, value) VALUES (?, ?)",
        params![SCHEMA_METADATA_KEY, serde_json::to_string(&snapshot.schema)?],
    )?;

    clock::write_clock_row(&tx, document_clock, history_start)?;
    tx.commit()?;
    Ok(())
}
