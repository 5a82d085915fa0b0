//! ledgerscan-evm — EVM log source boundary, normalizers, and ingestion loop.

pub mod ingest;
pub mod normalize;
pub mod rpc;

pub use ingest::{IngestConfig, IngestState, Ingester};
pub use normalize::{normalize_quiz_stake, normalize_transfer, BlockTimestampCache};
pub use rpc::{EvmRpcClient, LogQuery, RawLog};
