//! # Clock Access
//!
//! Reads and writes of the single-row `clock` table. The table holds the
//! room's `documentClock` and the tombstone history watermark
//! (`tombstoneHistoryStartsAtClock`), the clock below which deletions have
//! been pruned away.
//!
//! No compare-and-swap anywhere: the host serializes transactions per room,
//! so a plain `UPDATE` inside the enclosing transaction is already atomic
//! with respect to every other observer.

use rusqlite::Connection;

use crate::error::Result;
use crate::types::Clock;

/// Reads the current `documentClock`.
pub(crate) fn read_clock(conn: &Connection) -> Result<Clock> {
    let raw: i64 = conn.query_row("SELECT documentClock FROM clock", [], |row| row.get(0))?;
    Ok(Clock::from_db(raw))
}

/// Reads the tombstone history watermark.
pub(crate) fn read_history_start(conn: &Connection) -> Result<Clock> {
    let raw: i64 = conn.query_row(
        "SELECT tombstoneHistoryStartsAtClock FROM clock",
        [],
        |row| row.get(0),
    )?;
    Ok(Clock::from_db(raw))
}

/// Advances `documentClock` by one.
///
/// Called at most once per transaction, on the first mutation.
pub(crate) fn advance_clock(conn: &Connection) -> Result<()> {
    conn.execute("UPDATE clock SET documentClock = documentClock + 1", [])?;
    Ok(())
}

/// Moves the tombstone history watermark.
///
/// Only the pruner does this; clients whose change cursor falls below the
/// new watermark will be told to wipe.
pub(crate) fn write_history_start(conn: &Connection, watermark: Clock) -> Result<()> {
    conn.execute(
        "UPDATE clock SET tombstoneHistoryStartsAtClock = ?",
        [watermark.as_db()],
    )?;
    Ok(())
}

/// Inserts the `(0, 0)` clock row if the table is empty.
///
/// Keeps the one-row invariant on fresh databases while leaving an existing
/// row untouched on repeat construction.
pub(crate) fn ensure_clock_row(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO clock (documentClock, tombstoneHistoryStartsAtClock)
         SELECT 0, 0 WHERE NOT EXISTS (SELECT 1 FROM clock)",
        [],
    )?;
    Ok(())
}

/// Replaces the clock row with explicit values (snapshot ingestion).
pub(crate) fn write_clock_row(
    conn: &Connection,
    document_clock: Clock,
    history_start: Clock,
) -> Result<()> {
    conn.execute(
        "INSERT INTO clock (documentClock, tombstoneHistoryStartsAtClock) VALUES (?, ?)",
        [document_clock.as_db(), history_start.as_db()],
    )?;
    Ok(())
}
