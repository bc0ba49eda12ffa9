//! # Cold Load
//!
//! The one asynchronous surface of the crate. When a room wakes up on a
//! fresh database, its state may still live in cold storage as a legacy
//! snapshot; the host supplies an async [`SnapshotLoader`] that fetches it
//! by room slug. Once the store is constructed, everything else is
//! synchronous.

use rusqlite::Connection;

use crate::error::Result;
use crate::schema;
use crate::snapshot::RoomSnapshot;
use crate::store::DocumentStore;

/// What the cold-storage lookup found.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The room exists in cold storage; seed from its snapshot.
    RoomFound {
        /// The legacy snapshot to seed from.
        snapshot: RoomSnapshot,
    },

    /// The room has never been persisted; start empty.
    NotFound,
}

/// Host-provided fetch of a legacy snapshot from cold storage.
///
/// Invoked only on cold start, and only when the database holds no
/// bootstrapped room yet. The store lives on a single thread, so the
/// returned future is not required to be `Send`.
pub trait SnapshotLoader {
    /// Fetches the snapshot for `slug`, if one exists.
    fn load_snapshot(
        &self,
        slug: &str,
    ) -> impl std::future::Future<Output = Result<LoadOutcome>>;
}

/// Constructs the store for a room, loading from cold storage if needed.
///
/// - If the database already holds a bootstrapped room, the loader is never
///   called and existing data is retained.
/// - Otherwise the loader runs; a found snapshot seeds the store, and a
///   missing room starts empty.
pub async fn open_or_restore(
    conn: Connection,
    slug: &str,
    loader: &impl SnapshotLoader,
) -> Result<DocumentStore> {
    if schema::has_been_initialized(&conn) {
        return DocumentStore::new(conn, None);
    }

    match loader.load_snapshot(slug).await? {
        LoadOutcome::RoomFound { snapshot } => DocumentStore::new(conn, Some(snapshot)),
        LoadOutcome::NotFound => DocumentStore::new(conn, None),
    }
}
