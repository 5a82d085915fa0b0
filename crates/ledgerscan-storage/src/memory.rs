//! In-memory record store.
//!
//! Keeps every record in RAM. Useful for tests and short-lived ingesters
//! that don't need persistence.

use std::sync::Mutex;

use async_trait::async_trait;

use ledgerscan_core::error::IndexerError;
use ledgerscan_core::record::{TransactionRecord, TYPE_QUIZ_STAKE, TYPE_TOKEN_TRANSFER};
use ledgerscan_core::store::RecordStore;

use crate::StoreStats;

/// In-memory record store. All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<TransactionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Look up a record by transaction hash (case-insensitive).
    pub fn by_hash(&self, tx_hash: &str) -> Option<TransactionRecord> {
        let needle = tx_hash.to_ascii_lowercase();
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.tx_hash.eq_ignore_ascii_case(&needle))
            .cloned()
    }

    /// All records touching `address` as sender or receiver, newest first.
    pub fn by_address(&self, address: &str) -> Vec<TransactionRecord> {
        let needle = address.to_ascii_lowercase();
        let mut matches: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.from_address.eq_ignore_ascii_case(&needle)
                    || r.to_address.eq_ignore_ascii_case(&needle)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches
    }

    /// Aggregate counters over the stored records.
    pub fn stats(&self) -> StoreStats {
        let records = self.records.lock().unwrap();
        let mut senders: Vec<&str> = records.iter().map(|r| r.from_address.as_str()).collect();
        senders.sort_unstable();
        senders.dedup();
        StoreStats {
            total: records.len() as u64,
            transfers: records.iter().filter(|r| r.tx_type == TYPE_TOKEN_TRANSFER).count() as u64,
            quiz_stakes: records.iter().filter(|r| r.tx_type == TYPE_QUIZ_STAKE).count() as u64,
            latest_block: records.iter().map(|r| r.block_number).max(),
            unique_senders: senders.len() as u64,
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn max_block_number(&self) -> Result<Option<u64>, IndexerError> {
        Ok(self.records.lock().unwrap().iter().map(|r| r.block_number).max())
    }

    async fn exists(&self, tx_hash: &str) -> Result<bool, IndexerError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.tx_hash.eq_ignore_ascii_case(tx_hash)))
    }

    async fn insert(&self, record: &TransactionRecord) -> Result<(), IndexerError> {
        let mut records = self.records.lock().unwrap();
        if records
            .iter()
            .any(|r| r.tx_hash.eq_ignore_ascii_case(&record.tx_hash))
        {
            return Err(IndexerError::Duplicate {
                tx_hash: record.tx_hash.clone(),
            });
        }
        records.push(record.clone());
        Ok(())
    }
}
