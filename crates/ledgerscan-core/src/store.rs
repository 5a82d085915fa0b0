//! The record-store contract required by the ingestion engine.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::record::TransactionRecord;

/// Result of an idempotent insert attempt.
#[derive(Debug)]
pub enum InsertOutcome {
    /// The record was new and is now stored.
    Inserted,
    /// A record with the same `tx_hash` already exists; nothing was written.
    Duplicate,
    /// The check or the insert failed; the record is not known to be stored.
    Failed(IndexerError),
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate)
    }
}

/// Write-side contract the ingestion engine needs from a backend.
///
/// Implementations must enforce a uniqueness constraint on `tx_hash` inside
/// [`insert`](RecordStore::insert) (surfacing violations as
/// [`IndexerError::Duplicate`]) as a backstop for the check-then-insert
/// sequence in [`upsert_if_absent`](RecordStore::upsert_if_absent).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Highest stored block number, or `None` when the store is empty.
    async fn max_block_number(&self) -> Result<Option<u64>, IndexerError>;

    /// Whether a record with this `tx_hash` is already stored.
    async fn exists(&self, tx_hash: &str) -> Result<bool, IndexerError>;

    /// Insert a record. Fails with [`IndexerError::Duplicate`] on a
    /// `tx_hash` collision.
    async fn insert(&self, record: &TransactionRecord) -> Result<(), IndexerError>;

    /// Idempotent insert: store the record unless its `tx_hash` is already
    /// present.
    ///
    /// Never propagates an error — failures are logged and reported as
    /// [`InsertOutcome::Failed`] so sibling records in the same chunk keep
    /// being attempted.
    async fn upsert_if_absent(&self, record: &TransactionRecord) -> InsertOutcome {
        match self.exists(&record.tx_hash).await {
            Ok(true) => {
                tracing::debug!(tx_hash = %record.tx_hash, "duplicate record skipped");
                InsertOutcome::Duplicate
            }
            Ok(false) => match self.insert(record).await {
                Ok(()) => {
                    tracing::info!(
                        tx_hash = %record.tx_hash,
                        block = record.block_number,
                        tx_type = %record.tx_type,
                        "record inserted"
                    );
                    InsertOutcome::Inserted
                }
                // The unique constraint caught a same-process re-delivery
                // that slipped past the existence check.
                Err(e) if e.is_duplicate() => {
                    tracing::debug!(tx_hash = %record.tx_hash, "duplicate record skipped");
                    InsertOutcome::Duplicate
                }
                Err(e) => {
                    tracing::error!(tx_hash = %record.tx_hash, error = %e, "record insert failed");
                    InsertOutcome::Failed(e)
                }
            },
            Err(e) => {
                tracing::error!(tx_hash = %record.tx_hash, error = %e, "record existence check failed");
                InsertOutcome::Failed(e)
            }
        }
    }
}
