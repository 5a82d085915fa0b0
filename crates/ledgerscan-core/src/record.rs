//! The canonical transaction record — the unit of persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `method_name` tag for ERC-20 transfer events.
pub const METHOD_TRANSFER: &str = "transfer";
/// `method_name` tag for quiz stake events.
pub const METHOD_STAKE_FOR_QUIZ: &str = "stakeForQuiz";
/// `tx_type` tag for ERC-20 transfer events.
pub const TYPE_TOKEN_TRANSFER: &str = "Token Transfer";
/// `tx_type` tag for quiz stake events.
pub const TYPE_QUIZ_STAKE: &str = "Quiz Stake";
/// Records are only written once their block is observed; no pending state.
pub const STATUS_CONFIRMED: &str = "confirmed";

// ─── DecodedData ─────────────────────────────────────────────────────────────

/// Event-kind-specific payload, keyed by the record's `tx_type`.
///
/// Serializes to the flat JSON shape the query layer exposes:
/// `{"amount": "..."}` for transfers, `{"quizId": "...", "amount": "..."}`
/// for quiz stakes. Untagged variants are tried in declaration order, so the
/// variant with the larger field set must come first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecodedData {
    QuizStake {
        #[serde(rename = "quizId")]
        quiz_id: String,
        amount: String,
    },
    Transfer {
        amount: String,
    },
}

// ─── TransactionRecord ────────────────────────────────────────────────────────

/// A deduplicated, queryable record of one monitored chain event.
///
/// `tx_hash` is the globally unique key; everything else is immutable once
/// written. Addresses are stored lowercase so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Chain transaction identifier (`0x…`, 64 hex digits).
    pub tx_hash: String,
    /// Height of the block that emitted the underlying log.
    pub block_number: u64,
    /// Sender account (`0x…`, 40 hex digits, lowercase).
    pub from_address: String,
    /// Receiver account (`0x…`, 40 hex digits, lowercase).
    pub to_address: String,
    /// Transferred amount as decimal text — uint256 does not fit a float.
    pub value: String,
    /// Wall-clock time of the containing block.
    pub timestamp: DateTime<Utc>,
    /// Semantic method tag (`"transfer"` / `"stakeForQuiz"`).
    pub method_name: String,
    /// Semantic kind tag (`"Token Transfer"` / `"Quiz Stake"`).
    pub tx_type: String,
    /// Always `"confirmed"` at write time.
    pub status: String,
    /// Kind-specific structured payload.
    pub decoded_data: DecodedData,
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_payload_shape() {
        let data = DecodedData::Transfer {
            amount: "100".into(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json, serde_json::json!({ "amount": "100" }));
    }

    #[test]
    fn quiz_stake_payload_shape() {
        let data = DecodedData::QuizStake {
            quiz_id: "7".into(),
            amount: "50".into(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json, serde_json::json!({ "quizId": "7", "amount": "50" }));
    }

    #[test]
    fn decoded_data_roundtrip_distinguishes_kinds() {
        let stake = DecodedData::QuizStake {
            quiz_id: "7".into(),
            amount: "50".into(),
        };
        let back: DecodedData =
            serde_json::from_str(&serde_json::to_string(&stake).unwrap()).unwrap();
        assert_eq!(back, stake);

        let transfer = DecodedData::Transfer {
            amount: "100".into(),
        };
        let back: DecodedData =
            serde_json::from_str(&serde_json::to_string(&transfer).unwrap()).unwrap();
        assert_eq!(back, transfer);
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = TransactionRecord {
            tx_hash: "0xabc".into(),
            block_number: 450,
            from_address: "0xa".into(),
            to_address: "0xb".into(),
            value: "100".into(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            method_name: METHOD_TRANSFER.into(),
            tx_type: TYPE_TOKEN_TRANSFER.into(),
            status: STATUS_CONFIRMED.into(),
            decoded_data: DecodedData::Transfer {
                amount: "100".into(),
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["txHash"], "0xabc");
        assert_eq!(json["blockNumber"], 450);
        assert_eq!(json["decodedData"]["amount"], "100");
    }
}
