//! SQLite record store.
//!
//! Persists canonical transaction records to a single SQLite file. Uses
//! `sqlx` with WAL mode for concurrent read performance; the read-query
//! surface below is what the HTTP façade paginates and searches over.
//!
//! # Usage
//! ```rust,no_run
//! use ledgerscan_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./ledgerscan.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use ledgerscan_core::error::IndexerError;
use ledgerscan_core::record::{TransactionRecord, TYPE_QUIZ_STAKE, TYPE_TOKEN_TRANSFER};
use ledgerscan_core::store::RecordStore;

use crate::StoreStats;

/// SQLite-backed record store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./ledgerscan.db"`) or a full
    /// SQLite URL (`"sqlite:./ledgerscan.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// All data is lost when the pool is dropped. Ideal for tests.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create the transactions table and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        // WAL mode — better concurrent read throughput
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transactions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                tx_hash      TEXT    NOT NULL UNIQUE,
                block_number INTEGER NOT NULL,
                from_address TEXT    NOT NULL,
                to_address   TEXT    NOT NULL,
                value        TEXT    NOT NULL,
                timestamp    TEXT    NOT NULL,
                method_name  TEXT,
                tx_type      TEXT,
                status       TEXT,
                decoded_data TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        // Indexes for the façade's query patterns
        for stmt in [
            "CREATE INDEX IF NOT EXISTS idx_transactions_block ON transactions (block_number);",
            "CREATE INDEX IF NOT EXISTS idx_transactions_type ON transactions (tx_type);",
            "CREATE INDEX IF NOT EXISTS idx_transactions_from ON transactions (from_address);",
            "CREATE INDEX IF NOT EXISTS idx_transactions_to ON transactions (to_address);",
        ] {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| IndexerError::Storage(e.to_string()))?;
        }

        Ok(())
    }

    // ─── Read-query surface (consumed by the HTTP façade) ────────────────────────

    /// Latest records, newest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<TransactionRecord>, IndexerError> {
        let rows = sqlx::query(
            "SELECT * FROM transactions ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        rows.iter().map(record_from_row).collect()
    }

    /// One page of records, newest first.
    pub async fn page(
        &self,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<TransactionRecord>, IndexerError> {
        let rows = sqlx::query(
            "SELECT * FROM transactions ORDER BY timestamp DESC LIMIT ? OFFSET ?",
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        rows.iter().map(record_from_row).collect()
    }

    /// Total number of stored records.
    pub async fn count(&self) -> Result<u64, IndexerError> {
        self.scalar_count("SELECT COUNT(*) AS cnt FROM transactions", None).await
    }

    /// Look up one record by transaction hash.
    pub async fn by_hash(&self, tx_hash: &str) -> Result<Option<TransactionRecord>, IndexerError> {
        let row = sqlx::query("SELECT * FROM transactions WHERE tx_hash = ?")
            .bind(tx_hash.to_ascii_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Records where `address` is the sender or the receiver, newest first.
    pub async fn by_address(
        &self,
        address: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<TransactionRecord>, IndexerError> {
        let rows = sqlx::query(
            "SELECT * FROM transactions
             WHERE from_address = ?1 OR to_address = ?1
             ORDER BY timestamp DESC LIMIT ?2 OFFSET ?3",
        )
        .bind(address.to_ascii_lowercase())
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        rows.iter().map(record_from_row).collect()
    }

    /// Number of records touching `address`.
    pub async fn count_by_address(&self, address: &str) -> Result<u64, IndexerError> {
        self.scalar_count(
            "SELECT COUNT(*) AS cnt FROM transactions WHERE from_address = ?1 OR to_address = ?1",
            Some(address.to_ascii_lowercase()),
        )
        .await
    }

    /// Records of one kind (`"Token Transfer"` / `"Quiz Stake"`), newest first.
    pub async fn by_type(
        &self,
        tx_type: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<TransactionRecord>, IndexerError> {
        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE tx_type = ?
             ORDER BY timestamp DESC LIMIT ? OFFSET ?",
        )
        .bind(tx_type)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        rows.iter().map(record_from_row).collect()
    }

    /// Number of records of one kind.
    pub async fn count_by_type(&self, tx_type: &str) -> Result<u64, IndexerError> {
        self.scalar_count(
            "SELECT COUNT(*) AS cnt FROM transactions WHERE tx_type = ?",
            Some(tx_type.to_string()),
        )
        .await
    }

    /// Case-insensitive substring search over hash and addresses, newest first.
    pub async fn search(
        &self,
        fragment: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, IndexerError> {
        let pattern = format!("%{}%", fragment.to_ascii_lowercase());
        let rows = sqlx::query(
            "SELECT * FROM transactions
             WHERE tx_hash LIKE ?1 OR from_address LIKE ?1 OR to_address LIKE ?1
             ORDER BY timestamp DESC LIMIT ?2",
        )
        .bind(pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        rows.iter().map(record_from_row).collect()
    }

    /// Aggregate counters for the stats endpoint.
    pub async fn stats(&self) -> Result<StoreStats, IndexerError> {
        let total = self.count().await?;
        let transfers = self.count_by_type(TYPE_TOKEN_TRANSFER).await?;
        let quiz_stakes = self.count_by_type(TYPE_QUIZ_STAKE).await?;
        let latest_block = self.max_block_number().await?;
        let unique_senders = self
            .scalar_count("SELECT COUNT(DISTINCT from_address) AS cnt FROM transactions", None)
            .await?;

        Ok(StoreStats {
            total,
            transfers,
            quiz_stakes,
            latest_block,
            unique_senders,
        })
    }

    async fn scalar_count(&self, sql: &str, bind: Option<String>) -> Result<u64, IndexerError> {
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let row = query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl RecordStore for SqliteStore {
    async fn max_block_number(&self) -> Result<Option<u64>, IndexerError> {
        let row = sqlx::query("SELECT MAX(block_number) AS max_block FROM transactions")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let max: Option<i64> = row.get("max_block");
        Ok(max.map(|n| n as u64))
    }

    async fn exists(&self, tx_hash: &str) -> Result<bool, IndexerError> {
        let row = sqlx::query("SELECT 1 FROM transactions WHERE tx_hash = ?")
            .bind(tx_hash.to_ascii_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn insert(&self, record: &TransactionRecord) -> Result<(), IndexerError> {
        let decoded = serde_json::to_string(&record.decoded_data)
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query(
            "INSERT INTO transactions
                (tx_hash, block_number, from_address, to_address, value,
                 timestamp, method_name, tx_type, status, decoded_data)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.tx_hash)
        .bind(record.block_number as i64)
        .bind(&record.from_address)
        .bind(&record.to_address)
        .bind(&record.value)
        .bind(record.timestamp)
        .bind(&record.method_name)
        .bind(&record.tx_type)
        .bind(&record.status)
        .bind(&decoded)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            // Unique backstop: the dedup contract survives a racing check.
            sqlx::Error::Database(db) if db.is_unique_violation() => IndexerError::Duplicate {
                tx_hash: record.tx_hash.clone(),
            },
            _ => IndexerError::Storage(e.to_string()),
        })?;

        debug!(tx_hash = %record.tx_hash, block = record.block_number, "record stored");
        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<TransactionRecord, IndexerError> {
    let decoded: String = row.get("decoded_data");
    let decoded_data =
        serde_json::from_str(&decoded).map_err(|e| IndexerError::Storage(e.to_string()))?;

    Ok(TransactionRecord {
        tx_hash: row.get("tx_hash"),
        block_number: row.get::<i64, _>("block_number") as u64,
        from_address: row.get("from_address"),
        to_address: row.get("to_address"),
        value: row.get("value"),
        timestamp: row.get("timestamp"),
        method_name: row.get("method_name"),
        tx_type: row.get("tx_type"),
        status: row.get("status"),
        decoded_data,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
