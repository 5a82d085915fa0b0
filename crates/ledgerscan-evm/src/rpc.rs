//! Chain log source boundary.
//!
//! The ingestion engine only needs three JSON-RPC-shaped operations: current
//! head, filtered logs over a block range, and a block's timestamp. The
//! concrete transport lives in the embedding process; tests use in-memory
//! mocks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerscan_core::error::IndexerError;

/// ERC-20 Transfer event signature on the monitored token contract.
pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";
/// QuizOpened event signature on the quiz contract.
pub const QUIZ_OPENED_EVENT: &str = "QuizOpened(address,uint256,uint256)";

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "blockHash")]
    pub block_hash: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    pub removed: Option<bool>,
}

impl RawLog {
    /// Returns the block number as u64.
    pub fn block_number_u64(&self) -> u64 {
        parse_hex_u64(&self.block_number)
    }

    /// Returns `true` if this log was removed by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }

    /// Positional event arguments as 32-byte words (64 hex digits, no `0x`).
    ///
    /// Indexed arguments come from `topics[1..]`, the rest from consecutive
    /// words of `data`, which matches ABI ordering for events whose arguments
    /// are all value types.
    pub fn arg_words(&self) -> Vec<String> {
        let mut words: Vec<String> = self
            .topics
            .iter()
            .skip(1)
            .map(|t| t.strip_prefix("0x").unwrap_or(t).to_ascii_lowercase())
            .collect();
        let data = self.data.strip_prefix("0x").unwrap_or(&self.data);
        let mut rest = data;
        while rest.len() >= 64 {
            let (word, tail) = rest.split_at(64);
            words.push(word.to_ascii_lowercase());
            rest = tail;
        }
        words
    }
}

/// Filter for one monitored event kind: emitting contract + event signature.
#[derive(Debug, Clone)]
pub struct LogQuery {
    pub address: String,
    pub event_signature: String,
}

impl LogQuery {
    pub fn new(address: impl Into<String>, event_signature: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            event_signature: event_signature.into(),
        }
    }
}

/// Trait for fetching EVM data from a JSON-RPC provider.
#[async_trait]
pub trait EvmRpcClient: Send + Sync {
    /// Current chain head block number.
    async fn get_block_number(&self) -> Result<u64, IndexerError>;

    /// All logs matching `query` in the closed range `[from, to]`.
    async fn get_logs(
        &self,
        query: &LogQuery,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, IndexerError>;

    /// Timestamp of the block at `number`.
    async fn get_block_timestamp(&self, number: u64) -> Result<DateTime<Utc>, IndexerError>;
}

/// Parse a hex-encoded string (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> u64 {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).unwrap_or(0)
}
