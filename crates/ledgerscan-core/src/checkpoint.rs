//! Checkpoint — the highest block number known fully ingested.
//!
//! Not persisted on its own: the checkpoint is derived from the records it
//! summarizes (`max(block_number)` over the store) at startup and then held
//! by the scheduler as local state. It never overstates progress, so a crash
//! mid-chunk makes the next run re-scan that chunk; re-delivery is a no-op
//! thanks to the idempotent insert.

/// Blocks to look back from the chain head when the store is empty.
pub const BOOTSTRAP_LOOKBACK: u64 = 100;

/// The scheduler's ingestion floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    block: u64,
}

impl Checkpoint {
    /// Derive the starting checkpoint.
    ///
    /// Resumes from the highest stored block when the store has records;
    /// otherwise starts `lookback` blocks behind the current head to pick up
    /// recent history without an unbounded backfill.
    pub fn bootstrap(max_stored: Option<u64>, head: u64, lookback: u64) -> Self {
        Self {
            block: max_stored.unwrap_or_else(|| head.saturating_sub(lookback)),
        }
    }

    /// The highest fully ingested block.
    pub fn block(&self) -> u64 {
        self.block
    }

    /// The first block the next chunk should cover.
    pub fn next_block(&self) -> u64 {
        self.block + 1
    }

    /// Advance after a chunk completes. Monotonic: never moves backwards.
    pub fn advance_to(&mut self, block: u64) {
        if block > self.block {
            self.block = block;
        }
    }
}
