//! # roomdb - Room Document Store
//!
//! roomdb is the persistent backend of a real-time collaborative sync room,
//! built on SQLite. It provides:
//!
//! - **Authoritative records**: every live document of a room, keyed by id
//! - **A logical clock**: one monotonic `documentClock` tags every write
//! - **Tombstones**: deletions are remembered so lagging clients can catch up
//! - **An incremental change feed**: put/delete batches keyed by clock cursor
//! - **Transactional mutation**: atomic multi-record writes with commit
//!   notifications
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Host (sync layer)                        │
//! │        transaction(source, body)        onChange(listener)      │
//! └───────────────────────────┬─────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        DocumentStore                            │
//! │                                                                 │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────────┐  │
//! │  │ StoreTxn    │  │ ChangeBus    │  │ PruneScheduler         │  │
//! │  │ (one clock  │  │ (fires iff   │  │ (trailing debounce,    │  │
//! │  │  tick max)  │  │  did_change) │  │  cohort-safe trim)     │  │
//! │  └─────────────┘  └──────────────┘  └────────────────────────┘  │
//! └───────────────────────────┬─────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          SQLite                                 │
//! │        documents · tombstones · metadata · clock (1 row)        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Invariants
//!
//! 1. The `clock` table holds exactly one row
//! 2. Live documents and tombstones never share an id
//! 3. Every document's `lastChangedClock` ≤ `documentClock`
//! 4. Every tombstone's clock is between the history watermark and
//!    `documentClock`
//! 5. `documentClock` never decreases
//! 6. A transaction advances the clock at most once, however many records
//!    it touches
//!
//! ## Concurrency Model
//!
//! One store instance is single-threaded and single-writer: the host
//! serializes all room access, so there is no internal locking. The only
//! async surface is [`loader::open_or_restore`], the cold-start path that
//! fetches a legacy snapshot from external storage.

pub mod changes;
pub mod error;
pub mod listener;
pub mod loader;
pub mod pruner;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod txn;
pub mod types;

mod clock;

pub use changes::Change;
pub use error::{Error, Result};
pub use listener::{ChangeNotification, ListenerGuard};
pub use loader::{open_or_restore, LoadOutcome, SnapshotLoader};
pub use pruner::{PruneConfig, PruneOutcome, MAX_TOMBSTONES, PRUNE_BUFFER, PRUNE_DEBOUNCE};
pub use schema::{has_been_initialized, SCHEMA_METADATA_KEY};
pub use snapshot::{RoomSnapshot, SnapshotDocument};
pub use store::DocumentStore;
pub use txn::StoreTxn;
pub use types::{Clock, Document, Tombstone, TransactionOutcome};
