//! Event normalizers — map raw chain logs to canonical transaction records.
//!
//! One normalizer per monitored event kind. Both read their arguments
//! positionally from the log's 32-byte words, resolve the containing block's
//! timestamp, and emit a [`TransactionRecord`] with `status = "confirmed"`.

use std::collections::HashMap;

use alloy_primitives::U256;
use chrono::{DateTime, Utc};

use ledgerscan_core::error::IndexerError;
use ledgerscan_core::record::{
    DecodedData, TransactionRecord, METHOD_STAKE_FOR_QUIZ, METHOD_TRANSFER, STATUS_CONFIRMED,
    TYPE_QUIZ_STAKE, TYPE_TOKEN_TRANSFER,
};

use crate::rpc::{EvmRpcClient, RawLog};

/// Normalize a `Transfer(from, to, amount)` log into a record.
pub fn normalize_transfer(
    log: &RawLog,
    timestamp: DateTime<Utc>,
) -> Result<TransactionRecord, IndexerError> {
    let args = expect_args(log, 3)?;
    let amount = word_to_decimal(log, &args[2])?;

    Ok(TransactionRecord {
        tx_hash: log.tx_hash.to_ascii_lowercase(),
        block_number: log.block_number_u64(),
        from_address: word_to_address(log, &args[0])?,
        to_address: word_to_address(log, &args[1])?,
        value: amount.clone(),
        timestamp,
        method_name: METHOD_TRANSFER.into(),
        tx_type: TYPE_TOKEN_TRANSFER.into(),
        status: STATUS_CONFIRMED.into(),
        decoded_data: DecodedData::Transfer { amount },
    })
}

/// Normalize a `QuizOpened(user, quizId, amount)` log into a record.
///
/// The receiver is always the quiz contract itself — the log carries no
/// destination, so `quiz_address` comes from configuration.
pub fn normalize_quiz_stake(
    log: &RawLog,
    quiz_address: &str,
    timestamp: DateTime<Utc>,
) -> Result<TransactionRecord, IndexerError> {
    let args = expect_args(log, 3)?;
    let quiz_id = word_to_decimal(log, &args[1])?;
    let amount = word_to_decimal(log, &args[2])?;

    Ok(TransactionRecord {
        tx_hash: log.tx_hash.to_ascii_lowercase(),
        block_number: log.block_number_u64(),
        from_address: word_to_address(log, &args[0])?,
        to_address: quiz_address.to_ascii_lowercase(),
        value: amount.clone(),
        timestamp,
        method_name: METHOD_STAKE_FOR_QUIZ.into(),
        tx_type: TYPE_QUIZ_STAKE.into(),
        status: STATUS_CONFIRMED.into(),
        decoded_data: DecodedData::QuizStake { quiz_id, amount },
    })
}

fn expect_args(log: &RawLog, count: usize) -> Result<Vec<String>, IndexerError> {
    let args = log.arg_words();
    if args.len() < count {
        return Err(IndexerError::Normalize {
            tx_hash: log.tx_hash.clone(),
            reason: format!("expected {count} arguments, found {}", args.len()),
        });
    }
    Ok(args)
}

/// Lower 20 bytes of a 32-byte word as a lowercase `0x…` address.
fn word_to_address(log: &RawLog, word: &str) -> Result<String, IndexerError> {
    if word.len() != 64 || !word.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(IndexerError::Normalize {
            tx_hash: log.tx_hash.clone(),
            reason: format!("invalid address word: {word}"),
        });
    }
    Ok(format!("0x{}", &word[24..]))
}

/// A 32-byte word as lossless decimal text (uint256 overflows f64 and u64).
fn word_to_decimal(log: &RawLog, word: &str) -> Result<String, IndexerError> {
    U256::from_str_radix(word, 16)
        .map(|v| v.to_string())
        .map_err(|e| IndexerError::Normalize {
            tx_hash: log.tx_hash.clone(),
            reason: format!("invalid uint256 word {word}: {e}"),
        })
}

// ─── Block timestamp cache ────────────────────────────────────────────────────

/// Memoizes block → timestamp lookups within one fetch pass.
///
/// Resolving the timestamp is one RPC round trip per log and dominates
/// ingestion latency; logs sharing a block only pay for it once.
#[derive(Default)]
pub struct BlockTimestampCache {
    map: HashMap<u64, DateTime<Utc>>,
}

impl BlockTimestampCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp of `number`, fetching it on first use.
    pub async fn resolve<C: EvmRpcClient>(
        &mut self,
        client: &C,
        number: u64,
    ) -> Result<DateTime<Utc>, IndexerError> {
        if let Some(ts) = self.map.get(&number) {
            return Ok(*ts);
        }
        let ts = client.get_block_timestamp(number).await?;
        self.map.insert(number, ts);
        Ok(ts)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
