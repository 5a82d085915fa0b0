//! ledgerscan-core — foundation for the incremental event-ingestion engine.
//!
//! # Architecture
//!
//! ```text
//! Ingester (ledgerscan-evm)
//!     ├── Checkpoint     (resume floor, monotonic advance)
//!     ├── chunk_ranges   (bounded block sub-ranges)
//!     ├── Normalizers    (raw log → TransactionRecord)
//!     └── RecordStore    (memory / SQLite / Postgres, idempotent insert)
//! ```

pub mod checkpoint;
pub mod chunker;
pub mod error;
pub mod record;
pub mod store;

pub use checkpoint::{Checkpoint, BOOTSTRAP_LOOKBACK};
pub use chunker::{chunk_ranges, BlockRange, CHUNK_SIZE};
pub use error::IndexerError;
pub use record::{DecodedData, TransactionRecord};
pub use store::{InsertOutcome, RecordStore};
