//! Range chunker — splits a block interval into bounded sub-ranges.
//!
//! Log queries over wide ranges time out or get rejected by RPC providers,
//! so the scheduler never asks for more than [`CHUNK_SIZE`] blocks at once.

/// Maximum number of blocks per log query.
pub const CHUNK_SIZE: u64 = 1000;

/// A closed block interval `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    /// First block (inclusive).
    pub from: u64,
    /// Last block (inclusive).
    pub to: u64,
}

impl BlockRange {
    /// Number of blocks spanned (the range is closed, so never zero).
    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }
}

/// Split `[from, to]` into contiguous ascending sub-ranges of at most
/// `chunk_size` blocks, covering the interval exactly once.
///
/// Pure and lazy; yields nothing when `from > to`.
pub fn chunk_ranges(from: u64, to: u64, chunk_size: u64) -> impl Iterator<Item = BlockRange> {
    let size = chunk_size.max(1);
    let mut next = from;
    std::iter::from_fn(move || {
        if next > to {
            return None;
        }
        let end = next.saturating_add(size - 1).min(to);
        let range = BlockRange { from: next, to: end };
        next = end + 1;
        Some(range)
    })
}
