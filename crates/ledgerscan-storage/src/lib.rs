//! ledgerscan-storage — pluggable record-store backends for LedgerScan.
//!
//! Backends:
//! - [`memory`] — in-memory (dev/testing, no persistence)
//! - [`sqlite`] — SQLite via `sqlx` (embedded, single-file persistence)
//! - [`postgres`] — PostgreSQL via `sqlx` (the original deployment target)
//!
//! All backends hold the single `transactions` table: one row per monitored
//! chain event, unique by `tx_hash`. SQLite and Postgres additionally expose
//! the read-only query surface the HTTP façade is built on.

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;

/// Aggregate counters over the `transactions` table (`stats()` projection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Total stored records.
    pub total: u64,
    /// Records with `tx_type = "Token Transfer"`.
    pub transfers: u64,
    /// Records with `tx_type = "Quiz Stake"`.
    pub quiz_stakes: u64,
    /// Highest stored block number, if any records exist.
    pub latest_block: Option<u64>,
    /// Distinct sender addresses.
    pub unique_senders: u64,
}
