//! The ingestion scheduler — periodic, chunked, crash-resumable.
//!
//! Each tick:
//! 1. Fetch the chain head; nothing new → back to idle.
//! 2. Chunk `(checkpoint+1 ..= head)` into bounded ranges.
//! 3. Per chunk, sequentially: run the Transfer and QuizOpened passes
//!    concurrently, normalize and upsert every log, then advance the
//!    checkpoint to the chunk's upper bound.
//!
//! The checkpoint only advances when both passes of a chunk succeeded, so a
//! failed fetch is re-scanned on the next tick and deduplicated by the
//! idempotent insert. Ticks are serialized: the loop awaits each tick before
//! sleeping again.

use std::time::Duration;

use ledgerscan_core::checkpoint::{Checkpoint, BOOTSTRAP_LOOKBACK};
use ledgerscan_core::chunker::{chunk_ranges, BlockRange, CHUNK_SIZE};
use ledgerscan_core::error::IndexerError;
use ledgerscan_core::store::RecordStore;

use crate::normalize::{normalize_quiz_stake, normalize_transfer, BlockTimestampCache};
use crate::rpc::{EvmRpcClient, LogQuery, RawLog, QUIZ_OPENED_EVENT, TRANSFER_EVENT};

/// Configuration for an ingester instance.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Token contract emitting `Transfer` events.
    pub token_address: String,
    /// Quiz contract emitting `QuizOpened` events (also the recorded
    /// receiver of every quiz stake).
    pub quiz_address: String,
    /// Blocks per log query.
    pub chunk_size: u64,
    /// Tick period in milliseconds.
    pub poll_interval_ms: u64,
    /// Blocks to look back from head when the store is empty.
    pub bootstrap_lookback: u64,
}

impl IngestConfig {
    pub fn new(token_address: impl Into<String>, quiz_address: impl Into<String>) -> Self {
        Self {
            token_address: token_address.into(),
            quiz_address: quiz_address.into(),
            chunk_size: CHUNK_SIZE,
            poll_interval_ms: 30_000,
            bootstrap_lookback: BOOTSTRAP_LOOKBACK,
        }
    }
}

/// Scheduler phase, visible for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    /// Waiting for the next tick.
    Idle,
    /// Querying the chain head.
    FetchingHead,
    /// Working through the tick's chunk list.
    ProcessingChunks,
}

impl std::fmt::Display for IngestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::FetchingHead => write!(f, "fetching-head"),
            Self::ProcessingChunks => write!(f, "processing-chunks"),
        }
    }
}

/// The incremental event-ingestion engine.
///
/// Owns the checkpoint as local state; there is exactly one active ingester
/// per store (no multi-instance coordination).
pub struct Ingester<C: EvmRpcClient, S: RecordStore> {
    config: IngestConfig,
    client: C,
    store: S,
    checkpoint: Checkpoint,
    state: IngestState,
}

impl<C: EvmRpcClient, S: RecordStore> Ingester<C, S> {
    /// Create an ingester, deriving the checkpoint from store state.
    ///
    /// Resumes from `max(block_number)` when records exist. An empty store —
    /// or a store that fails the max query — bootstraps to
    /// `head - bootstrap_lookback`. Only a head fetch failure aborts startup.
    pub async fn initialize(
        config: IngestConfig,
        client: C,
        store: S,
    ) -> Result<Self, IndexerError> {
        let max_stored = match store.max_block_number().await {
            Ok(max) => max,
            Err(e) => {
                tracing::warn!(error = %e, "max block query failed, bootstrapping from head");
                None
            }
        };

        let checkpoint = match max_stored {
            Some(block) => {
                tracing::info!(block, "resuming from last stored block");
                Checkpoint::bootstrap(Some(block), 0, config.bootstrap_lookback)
            }
            None => {
                let head = client.get_block_number().await?;
                let cp = Checkpoint::bootstrap(None, head, config.bootstrap_lookback);
                tracing::info!(block = cp.block(), head, "starting from lookback window");
                cp
            }
        };

        Ok(Self {
            config,
            client,
            store,
            checkpoint,
            state: IngestState::Idle,
        })
    }

    /// Highest block known fully ingested.
    pub fn checkpoint_block(&self) -> u64 {
        self.checkpoint.block()
    }

    /// Current scheduler phase.
    pub fn state(&self) -> IngestState {
        self.state
    }

    /// Run the scheduler until cancelled by the caller.
    ///
    /// Ticks immediately once, then every `poll_interval_ms`. Tick failures
    /// are logged and retried on the next firing; nothing here is fatal.
    pub async fn run(&mut self) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "ingestion tick failed, retrying next interval");
            }
        }
    }

    /// One scheduler pass: ingest everything between checkpoint and head.
    ///
    /// Returns early (checkpoint unmoved past the failing chunk) when a
    /// chunk's fetch or normalization fails; the next tick re-scans it.
    pub async fn tick(&mut self) -> Result<(), IndexerError> {
        self.state = IngestState::FetchingHead;
        let head = match self.client.get_block_number().await {
            Ok(head) => head,
            Err(e) => {
                self.state = IngestState::Idle;
                return Err(e);
            }
        };

        if head <= self.checkpoint.block() {
            self.state = IngestState::Idle;
            return Ok(());
        }

        self.state = IngestState::ProcessingChunks;
        tracing::debug!(
            from = self.checkpoint.next_block(),
            to = head,
            "processing new blocks"
        );

        for range in chunk_ranges(self.checkpoint.next_block(), head, self.config.chunk_size) {
            let transfers = LogQuery::new(&self.config.token_address, TRANSFER_EVENT);
            let stakes = LogQuery::new(&self.config.quiz_address, QUIZ_OPENED_EVENT);

            // The two event kinds are independent; fetch them concurrently.
            // Chunks themselves stay sequential so the checkpoint advances
            // in block order.
            let (transfer_pass, stake_pass) = futures::join!(
                self.process_kind(&transfers, EventKind::Transfer, range),
                self.process_kind(&stakes, EventKind::QuizStake, range),
            );

            match transfer_pass.and(stake_pass) {
                Ok(()) => self.checkpoint.advance_to(range.to),
                Err(e) => {
                    tracing::warn!(
                        from = range.from,
                        to = range.to,
                        error = %e,
                        "chunk failed, checkpoint held for re-scan"
                    );
                    self.state = IngestState::Idle;
                    return Err(e);
                }
            }
        }

        tracing::info!(block = self.checkpoint.block(), "ingested up to block");
        self.state = IngestState::Idle;
        Ok(())
    }

    /// Fetch, normalize, and upsert one event kind over one chunk.
    ///
    /// Fetch and normalization errors fail the pass; insert failures are
    /// per-record best-effort (logged inside `upsert_if_absent`) and do not
    /// stop sibling records.
    async fn process_kind(
        &self,
        query: &LogQuery,
        kind: EventKind,
        range: BlockRange,
    ) -> Result<(), IndexerError> {
        let logs = self.client.get_logs(query, range.from, range.to).await?;
        tracing::debug!(
            event = query.event_signature.as_str(),
            from = range.from,
            to = range.to,
            count = logs.len(),
            "fetched logs"
        );

        let mut timestamps = BlockTimestampCache::new();
        for log in &logs {
            if log.is_removed() {
                continue;
            }
            let timestamp = timestamps.resolve(&self.client, log.block_number_u64()).await?;
            let record = self.normalize(kind, log, timestamp)?;
            self.store.upsert_if_absent(&record).await;
        }
        Ok(())
    }

    fn normalize(
        &self,
        kind: EventKind,
        log: &RawLog,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Result<ledgerscan_core::record::TransactionRecord, IndexerError> {
        match kind {
            EventKind::Transfer => normalize_transfer(log, timestamp),
            EventKind::QuizStake => normalize_quiz_stake(log, &self.config.quiz_address, timestamp),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum EventKind {
    Transfer,
    QuizStake,
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use ledgerscan_core::record::{DecodedData, TransactionRecord};
    use ledgerscan_storage::memory::MemoryStore;

    const TOKEN: &str = "0x8D6Eb13387fef993414378d8304754B93B2B9857";
    const QUIZ: &str = "0x02cbE607b9E0C19543f672718ca997692840FdBd";

    fn word(tail: &str) -> String {
        format!("{tail:0>64}")
    }

    fn transfer_log(block: u64, tx: &str, from: &str, to: &str, amount: u64) -> RawLog {
        RawLog {
            address: TOKEN.to_ascii_lowercase(),
            topics: vec![
                "0xtransfer".into(),
                format!("0x{}", word(from)),
                format!("0x{}", word(to)),
            ],
            data: format!("0x{}", word(&format!("{amount:x}"))),
            block_number: format!("0x{block:x}"),
            block_hash: format!("0xblock{block}"),
            tx_hash: tx.into(),
            log_index: "0x0".into(),
            removed: None,
        }
    }

    fn quiz_log(block: u64, tx: &str, user: &str, quiz_id: u64, amount: u64) -> RawLog {
        RawLog {
            address: QUIZ.to_ascii_lowercase(),
            topics: vec!["0xquizopened".into(), format!("0x{}", word(user))],
            data: format!("0x{}{}", word(&format!("{quiz_id:x}")), word(&format!("{amount:x}"))),
            block_number: format!("0x{block:x}"),
            block_hash: format!("0xblock{block}"),
            tx_hash: tx.into(),
            log_index: "0x1".into(),
            removed: None,
        }
    }

    /// Mock chain: fixed head, logs keyed by event signature, optional
    /// one-shot fetch failure, and call counters.
    struct MockChain {
        head: u64,
        logs: HashMap<&'static str, Vec<RawLog>>,
        fail_transfer_fetches: AtomicU32,
        log_calls: Mutex<Vec<(String, u64, u64)>>,
        timestamp_calls: AtomicU32,
    }

    impl MockChain {
        fn new(head: u64) -> Self {
            Self {
                head,
                logs: HashMap::new(),
                fail_transfer_fetches: AtomicU32::new(0),
                log_calls: Mutex::new(Vec::new()),
                timestamp_calls: AtomicU32::new(0),
            }
        }

        fn with_logs(mut self, signature: &'static str, logs: Vec<RawLog>) -> Self {
            self.logs.insert(signature, logs);
            self
        }
    }

    #[async_trait]
    impl EvmRpcClient for Arc<MockChain> {
        async fn get_block_number(&self) -> Result<u64, IndexerError> {
            Ok(self.head)
        }

        async fn get_logs(
            &self,
            query: &LogQuery,
            from: u64,
            to: u64,
        ) -> Result<Vec<RawLog>, IndexerError> {
            self.log_calls
                .lock()
                .unwrap()
                .push((query.event_signature.clone(), from, to));
            if query.event_signature == TRANSFER_EVENT
                && self
                    .fail_transfer_fetches
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(IndexerError::Rpc("rate limited".into()));
            }
            Ok(self
                .logs
                .get(query.event_signature.as_str())
                .map(|logs| {
                    logs.iter()
                        .filter(|l| (from..=to).contains(&l.block_number_u64()))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn get_block_timestamp(&self, number: u64) -> Result<DateTime<Utc>, IndexerError> {
            self.timestamp_calls.fetch_add(1, Ordering::SeqCst);
            Ok(DateTime::from_timestamp(number as i64 * 12, 0).unwrap())
        }
    }

    fn config() -> IngestConfig {
        IngestConfig::new(TOKEN, QUIZ)
    }

    fn scenario_chain() -> Arc<MockChain> {
        Arc::new(
            MockChain::new(500)
                .with_logs(
                    TRANSFER_EVENT,
                    vec![transfer_log(450, "0xt1", "a", "b", 100)],
                )
                .with_logs(QUIZ_OPENED_EVENT, vec![quiz_log(460, "0xq1", "c", 7, 50)]),
        )
    }

    #[tokio::test]
    async fn bootstrap_on_empty_store_uses_lookback() {
        let chain = scenario_chain();
        let ingester = Ingester::initialize(config(), chain, MemoryStore::new())
            .await
            .unwrap();
        assert_eq!(ingester.checkpoint_block(), 400);
        assert_eq!(ingester.state(), IngestState::Idle);
    }

    #[tokio::test]
    async fn one_tick_ingests_both_event_kinds() {
        let chain = scenario_chain();
        let mut ingester = Ingester::initialize(config(), chain.clone(), MemoryStore::new())
            .await
            .unwrap();

        ingester.tick().await.unwrap();

        assert_eq!(ingester.checkpoint_block(), 500);
        assert_eq!(ingester.store.count(), 2);

        let transfer = ingester.store.by_hash("0xt1").unwrap();
        assert_eq!(transfer.tx_type, "Token Transfer");
        assert_eq!(transfer.block_number, 450);
        assert_eq!(
            transfer.from_address,
            format!("0x{:0>40}", "a")
        );
        assert_eq!(transfer.value, "100");
        assert_eq!(
            transfer.decoded_data,
            DecodedData::Transfer { amount: "100".into() }
        );

        let stake = ingester.store.by_hash("0xq1").unwrap();
        assert_eq!(stake.tx_type, "Quiz Stake");
        assert_eq!(stake.to_address, QUIZ.to_ascii_lowercase());
        assert_eq!(
            stake.decoded_data,
            DecodedData::QuizStake { quiz_id: "7".into(), amount: "50".into() }
        );

        // Both kinds were queried over the single chunk (401..=500).
        let calls = chain.log_calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, from, to)| (*from, *to) == (401, 500)));
    }

    #[tokio::test]
    async fn rerunning_the_same_tick_is_idempotent() {
        let chain = scenario_chain();
        let store = MemoryStore::new();
        let mut ingester = Ingester::initialize(config(), chain.clone(), store)
            .await
            .unwrap();

        ingester.tick().await.unwrap();
        assert_eq!(ingester.store.count(), 2);

        // Force a full re-scan of the same range.
        ingester.checkpoint = Checkpoint::bootstrap(Some(400), 0, 100);
        ingester.tick().await.unwrap();

        assert_eq!(ingester.store.count(), 2);
        assert_eq!(ingester.checkpoint_block(), 500);
    }

    #[tokio::test]
    async fn no_new_blocks_is_a_noop() {
        let chain = Arc::new(MockChain::new(500));
        let store = MemoryStore::new();
        store
            .insert(&sample_record("0xseed", 500))
            .await
            .unwrap();

        let mut ingester = Ingester::initialize(config(), chain.clone(), store)
            .await
            .unwrap();
        assert_eq!(ingester.checkpoint_block(), 500);

        ingester.tick().await.unwrap();
        assert!(chain.log_calls.lock().unwrap().is_empty());
        assert_eq!(ingester.checkpoint_block(), 500);
    }

    #[tokio::test]
    async fn resumes_after_last_stored_block() {
        let chain = scenario_chain();
        let store = MemoryStore::new();
        store
            .insert(&sample_record("0xseed", 455))
            .await
            .unwrap();

        let mut ingester = Ingester::initialize(config(), chain.clone(), store)
            .await
            .unwrap();
        assert_eq!(ingester.checkpoint_block(), 455);

        ingester.tick().await.unwrap();

        // The transfer at 450 is below the resume floor and must be skipped;
        // the stake at 460 is picked up.
        assert!(ingester.store.by_hash("0xt1").is_none());
        assert!(ingester.store.by_hash("0xq1").is_some());
        let calls = chain.log_calls.lock().unwrap();
        assert!(calls.iter().all(|(_, from, _)| *from == 456));
    }

    #[tokio::test]
    async fn failed_fetch_holds_checkpoint_until_next_tick() {
        let chain = scenario_chain();
        chain.fail_transfer_fetches.store(1, Ordering::SeqCst);

        let mut ingester = Ingester::initialize(config(), chain.clone(), MemoryStore::new())
            .await
            .unwrap();

        let err = ingester.tick().await.unwrap_err();
        assert!(matches!(err, IndexerError::Rpc(_)));
        assert_eq!(ingester.checkpoint_block(), 400);
        assert_eq!(ingester.state(), IngestState::Idle);

        // Next tick re-scans the chunk and catches up without duplicates.
        ingester.tick().await.unwrap();
        assert_eq!(ingester.checkpoint_block(), 500);
        assert_eq!(ingester.store.count(), 2);
    }

    #[tokio::test]
    async fn multi_chunk_range_advances_in_order() {
        let chain = Arc::new(
            MockChain::new(2600).with_logs(
                TRANSFER_EVENT,
                vec![
                    transfer_log(150, "0xt1", "a", "b", 1),
                    transfer_log(1200, "0xt2", "a", "b", 2),
                    transfer_log(2550, "0xt3", "a", "b", 3),
                ],
            ),
        );
        let store = MemoryStore::new();
        store.insert(&sample_record("0xseed", 100)).await.unwrap();

        let mut ingester = Ingester::initialize(config(), chain.clone(), store)
            .await
            .unwrap();
        ingester.tick().await.unwrap();

        assert_eq!(ingester.checkpoint_block(), 2600);
        assert_eq!(ingester.store.count(), 4); // seed + 3 transfers

        let calls = chain.log_calls.lock().unwrap();
        let transfer_ranges: Vec<(u64, u64)> = calls
            .iter()
            .filter(|(sig, _, _)| sig == TRANSFER_EVENT)
            .map(|(_, from, to)| (*from, *to))
            .collect();
        assert_eq!(transfer_ranges, vec![(101, 1100), (1101, 2100), (2101, 2600)]);
    }

    #[tokio::test]
    async fn shared_block_pays_one_timestamp_lookup() {
        let chain = Arc::new(MockChain::new(500).with_logs(
            TRANSFER_EVENT,
            vec![
                transfer_log(450, "0xt1", "a", "b", 1),
                transfer_log(450, "0xt2", "a", "b", 2),
                transfer_log(450, "0xt3", "a", "b", 3),
            ],
        ));
        let mut ingester = Ingester::initialize(config(), chain.clone(), MemoryStore::new())
            .await
            .unwrap();
        ingester.tick().await.unwrap();

        assert_eq!(ingester.store.count(), 3);
        assert_eq!(chain.timestamp_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn removed_logs_are_skipped() {
        let mut removed = transfer_log(450, "0xgone", "a", "b", 9);
        removed.removed = Some(true);
        let chain = Arc::new(MockChain::new(500).with_logs(TRANSFER_EVENT, vec![removed]));

        let mut ingester = Ingester::initialize(config(), chain, MemoryStore::new())
            .await
            .unwrap();
        ingester.tick().await.unwrap();

        assert_eq!(ingester.store.count(), 0);
        assert_eq!(ingester.checkpoint_block(), 500);
    }

    fn sample_record(tx_hash: &str, block: u64) -> TransactionRecord {
        TransactionRecord {
            tx_hash: tx_hash.into(),
            block_number: block,
            from_address: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".into(),
            to_address: "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".into(),
            value: "1".into(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            method_name: "transfer".into(),
            tx_type: "Token Transfer".into(),
            status: "confirmed".into(),
            decoded_data: DecodedData::Transfer { amount: "1".into() },
        }
    }
}
