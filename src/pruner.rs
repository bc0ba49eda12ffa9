//! # Tombstone Pruning
//!
//! Tombstones let lagging clients learn about deletions incrementally, but
//! the table cannot grow forever. The pruner enforces a soft bound: once the
//! count passes `max_tombstones`, everything except (at least) the
//! `prune_buffer` most recent rows is dropped and the history watermark is
//! advanced so that clients older than the dropped rows get told to wipe.
//!
//! ## Clock cohorts
//!
//! All tombstones created by one transaction share one clock value. A cohort
//! is dropped all-or-nothing: the cutoff slides past equal-clock neighbours
//! before anything is deleted, so a client cursor can never land in the
//! middle of a half-pruned transaction.
//!
//! ## Scheduling
//!
//! Pruning is deferred. Every delete re-arms a trailing one-second window;
//! the prune runs once the window has been quiet that long, so a burst of
//! deletes coalesces into a single run. The host drives the window from its
//! event loop via [`crate::store::DocumentStore::run_scheduled_prune`].

use std::time::{Duration, Instant};

use rusqlite::Connection;
use tracing::debug;

use crate::clock;
use crate::error::Result;
use crate::types::Clock;

/// Soft upper bound on the tombstone count before a prune is worthwhile.
pub const MAX_TOMBSTONES: usize = 5000;

/// How many of the most recent tombstones a prune keeps, at minimum.
pub const PRUNE_BUFFER: usize = 1000;

/// Quiet period after the last delete before a scheduled prune runs.
pub const PRUNE_DEBOUNCE: Duration = Duration::from_secs(1);

/// Tuning knobs for the pruner. The defaults match the room wire contract;
/// tests shrink them to exercise the algorithm cheaply.
#[derive(Debug, Clone)]
pub struct PruneConfig {
    /// Prune only when the tombstone count exceeds this.
    pub max_tombstones: usize,

    /// Keep at least this many of the most recent tombstones.
    pub prune_buffer: usize,

    /// Trailing debounce window for scheduled prunes.
    pub debounce: Duration,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            max_tombstones: MAX_TOMBSTONES,
            prune_buffer: PRUNE_BUFFER,
            debounce: PRUNE_DEBOUNCE,
        }
    }
}

/// What a prune run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Tombstone count at the start of the run.
    pub examined: usize,

    /// Rows deleted. Zero when the count was under the bound or the cutoff
    /// cohort extended to the whole table.
    pub pruned: usize,

    /// The watermark written by this run, if the run got far enough to
    /// write one.
    pub new_watermark: Option<Clock>,
}

/// Trailing-edge debounce for deferred prune requests.
///
/// `request` re-arms the window; `take_due` fires once the window has been
/// quiet for the full debounce interval. Multiple requests during the quiet
/// period collapse into one run.
#[derive(Debug)]
pub(crate) struct PruneScheduler {
    debounce: Duration,
    last_request: Option<Instant>,
}

impl PruneScheduler {
    pub(crate) fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_request: None,
        }
    }

    /// Records a prune request at `now`, restarting the quiet window.
    pub(crate) fn request(&mut self, now: Instant) {
        self.last_request = Some(now);
    }

    /// Returns whether a request is waiting for its window to elapse.
    pub(crate) fn is_pending(&self) -> bool {
        self.last_request.is_some()
    }

    /// Consumes the pending request if its quiet window has elapsed.
    pub(crate) fn take_due(&mut self, now: Instant) -> bool {
        match self.last_request {
            Some(at) if now.duration_since(at) >= self.debounce => {
                self.last_request = None;
                true
            }
            _ => false,
        }
    }

    /// Drops any pending request (a forced prune already covered it).
    pub(crate) fn clear(&mut self) {
        self.last_request = None;
    }
}

/// Runs one prune pass in its own transaction.
///
/// Keeps at least `prune_buffer` of the newest tombstones, extends the
/// cutoff past any clock cohort it would split, advances the watermark to
/// the boundary cohort's clock (or to the room clock when the cohort
/// extension reached the end of the table), and deletes everything at or
/// below that boundary.
pub(crate) fn prune_tombstones(conn: &mut Connection, config: &PruneConfig) -> Result<PruneOutcome> {
    let tx = conn.transaction()?;

    let count: i64 = tx.query_row("SELECT COUNT(*) FROM tombstones", [], |row| row.get(0))?;
    let count = count as usize;
    if count <= config.max_tombstones {
        return Ok(PruneOutcome {
            examined: count,
            pruned: 0,
            new_watermark: None,
        });
    }

    // Newest first; index prune_buffer is the first candidate for deletion.
    let clocks: Vec<i64> = {
        let mut stmt = tx.prepare("SELECT clock FROM tombstones ORDER BY clock DESC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };
    let total = clocks.len();

    let mut cutoff = config.prune_buffer;
    while cutoff < total && clocks[cutoff - 1] == clocks[cutoff] {
        cutoff += 1;
    }

    let new_watermark = if cutoff < total {
        Clock::from_db(clocks[cutoff])
    } else {
        clock::read_clock(&tx)?
    };
    clock::write_history_start(&tx, new_watermark)?;

    let mut pruned = 0;
    if cutoff < total {
        // The cohort loop guarantees clocks[cutoff - 1] > clocks[cutoff], so
        // deleting at or below the boundary clock is exactly "delete every
        // row from the cutoff on".
        pruned = tx.execute(
            "DELETE FROM tombstones WHERE clock <= ?",
            [clocks[cutoff]],
        )?;
    }

    tx.commit()?;
    debug!(
        examined = total,
        pruned,
        new_watermark = new_watermark.as_raw(),
        "pruned tombstone history"
    );

    Ok(PruneOutcome {
        examined: total,
        pruned,
        new_watermark: Some(new_watermark),
    })
}
