//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record already stored: {tx_hash}")]
    Duplicate { tx_hash: String },

    #[error("Malformed log in tx {tx_hash}: {reason}")]
    Normalize { tx_hash: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if the error is the unique-constraint backstop firing.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}
