//! # SQLite Schema
//!
//! DDL for the four tables backing a room, plus the initialization probe.
//!
//! ## Table Overview
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  documents                     tombstones                          │
//! │  ┌──────────────────────┐      ┌──────────────────┐                │
//! │  │ id (PK)              │      │ id (PK)          │  disjoint id   │
//! │  │ state TEXT           │      │ clock            │  keyspaces     │
//! │  │ lastChangedClock ──┐ │      └──────────────────┘                │
//! │  └────────────────────┼─┘                                          │
//! │        index ─────────┘                                            │
//! │                                                                    │
//! │  metadata                      clock (exactly one row)             │
//! │  ┌──────────────────────┐      ┌───────────────────────────────┐   │
//! │  │ key (PK)             │      │ documentClock                 │   │
//! │  │ value                │      │ tombstoneHistoryStartsAtClock │   │
//! │  └──────────────────────┘      └───────────────────────────────┘   │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Column names are part of the on-disk contract: databases written by other
//! implementations of this room format must remain readable, so the DDL is
//! issued verbatim and never renamed.
//!
//! All statements use `IF NOT EXISTS`, so bootstrap is idempotent: repeat
//! construction over an existing database loses no data.

use rusqlite::Connection;

use crate::error::Result;

/// Reserved metadata key carrying the serialized record schema descriptor.
///
/// The value is opaque to the store; it is written verbatim from the seed
/// snapshot and handed back verbatim on export. All other metadata keys are
/// application-defined passthrough.
pub const SCHEMA_METADATA_KEY: &str = "schema";

/// Live records, keyed by the `id` extracted from each record.
///
/// `state` is the record's self-describing JSON serialization. The
/// `lastChangedClock` index accelerates the incremental change query
/// (`lastChangedClock > cursor`).
const CREATE_DOCUMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id               TEXT PRIMARY KEY,
    state            TEXT NOT NULL,
    lastChangedClock INTEGER NOT NULL
)
"#;

const CREATE_DOCUMENTS_CLOCK_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS documents_lastChangedClock
ON documents (lastChangedClock)
"#;

/// Deletion markers, one row per deleted record.
///
/// `clock` is the room clock at which the deletion committed. Rows are
/// trimmed by the pruner once the table grows past its soft bound.
const CREATE_TOMBSTONES: &str = r#"
CREATE TABLE IF NOT EXISTS tombstones (
    id    TEXT PRIMARY KEY,
    clock INTEGER NOT NULL
)
"#;

/// Room-level string metadata.
///
/// One key ([`SCHEMA_METADATA_KEY`]) is reserved; the rest is passthrough.
const CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

/// The room clock. Exactly one row at every transaction boundary.
///
/// A one-row table rather than a `metadata` key so the advance is a plain
/// `UPDATE ... SET documentClock = documentClock + 1` inside the enclosing
/// transaction.
const CREATE_CLOCK: &str = r#"
CREATE TABLE IF NOT EXISTS clock (
    documentClock                 INTEGER NOT NULL,
    tombstoneHistoryStartsAtClock INTEGER NOT NULL
)
"#;

/// Creates the four tables and the change index if they do not exist.
pub(crate) fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_DOCUMENTS)?;
    conn.execute_batch(CREATE_DOCUMENTS_CLOCK_INDEX)?;
    conn.execute_batch(CREATE_TOMBSTONES)?;
    conn.execute_batch(CREATE_METADATA)?;
    conn.execute_batch(CREATE_CLOCK)?;
    Ok(())
}

/// Answers whether this handle already holds a bootstrapped room.
///
/// Probes `SELECT 1 FROM clock LIMIT 1`. Any error (most commonly: the table
/// does not exist) and the empty result both mean "not initialized"; this is
/// the one place a SQLite error is swallowed rather than propagated. Callers
/// use it to choose between immediate construction and the cold-load path.
pub fn has_been_initialized(conn: &Connection) -> bool {
    conn.query_row("SELECT 1 FROM clock LIMIT 1", [], |_| Ok(()))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_all_tables_and_index() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);

        let indexes: Vec<String> = {
            let mut stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master
                     WHERE type = 'index' AND name NOT LIKE 'sqlite_%'",
                )
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .collect::<std::result::Result<Vec<_>, _>>()
                .unwrap()
        };
        assert!(indexes.contains(&"documents_lastChangedClock".to_string()));
    }

    #[test]
    fn create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO documents (id, state, lastChangedClock) VALUES ('a', '{}', 1)",
            [],
        )
        .unwrap();

        create_tables(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn probe_is_false_without_tables() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!has_been_initialized(&conn));
    }

    #[test]
    fn probe_is_false_with_empty_clock_table() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        assert!(!has_been_initialized(&conn));
    }

    #[test]
    fn probe_is_true_once_clock_row_exists() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO clock (documentClock, tombstoneHistoryStartsAtClock) VALUES (0, 0)",
            [],
        )
        .unwrap();
        assert!(has_been_initialized(&conn));
    }
}
