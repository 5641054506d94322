//! This library contains the sequencer, which orders submitted transactions into L2 messages
//! and appends them to the message store.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use alloy_primitives::U256;
use parking_lot::Mutex;
use rollup_codec::encode_l2_transactions;
use rollup_db::MessageStore;
use rollup_primitives::{
    L2Transaction, Message, MessageHeader, MessageIndex, MessageKind, MessageWithMetadata,
    BATCH_POSTER_ADDRESS,
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

mod config;
pub use config::{
    SequencerConfig, DEFAULT_BLOCK_TIME_MS, DEFAULT_MAX_TXS_PER_BLOCK, DEFAULT_MAX_TX_DATA_SIZE,
    DEFAULT_QUEUE_SIZE,
};

mod error;
pub use error::{FilterRejection, SequencerError, TxFilterError};

pub mod filter;
pub use filter::{BlockFilter, CensorList, MaxBlockGas, MaxTxDataSize, SenderWhitelist, TxFilter};

mod metrics;
use metrics::SequencerMetrics;

/// A block sequenced into the message store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedBlock {
    /// The index of the appended message.
    pub index: MessageIndex,
    /// The sequenced transactions, in submission order.
    pub transactions: Vec<L2Transaction>,
    /// The transactions dropped by transaction filters.
    pub filter_errors: Vec<TxFilterError>,
}

/// The outcome of a block production attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductionOutcome {
    /// A block was appended to the message store.
    Produced(SequencedBlock),
    /// No transaction survived the filters, nothing was appended.
    Empty {
        /// The transactions dropped by transaction filters.
        filter_errors: Vec<TxFilterError>,
    },
}

/// The sequencer is responsible for ordering transactions and producing new blocks.
#[derive(Debug)]
pub struct Sequencer {
    /// The canonical message log.
    store: Arc<MessageStore>,
    /// The sequencer configuration.
    config: SequencerConfig,
    /// Submitted transactions waiting for a block.
    queue: Mutex<VecDeque<L2Transaction>>,
    /// Filters applied to each candidate transaction.
    tx_filters: Vec<Box<dyn TxFilter>>,
    /// Filters applied to the transaction set of each block.
    block_filters: Vec<Box<dyn BlockFilter>>,
    /// The latest parent chain block number, attributed to produced messages.
    parent_chain_block_number: AtomicU64,
    metrics: SequencerMetrics,
}

impl Sequencer {
    /// Returns a new [`Sequencer`] with the filters derived from the configuration.
    pub fn new(store: Arc<MessageStore>, config: SequencerConfig) -> Self {
        let mut tx_filters: Vec<Box<dyn TxFilter>> =
            vec![Box::new(MaxTxDataSize(config.max_tx_data_size))];
        if !config.sender_whitelist.is_empty() {
            tx_filters.push(Box::new(SenderWhitelist::new(config.sender_whitelist.clone())));
        }

        Self {
            store,
            config,
            queue: Mutex::new(VecDeque::new()),
            tx_filters,
            block_filters: Vec::new(),
            parent_chain_block_number: AtomicU64::new(0),
            metrics: SequencerMetrics::default(),
        }
    }

    /// Adds a transaction filter, run after the previously added ones.
    pub fn with_tx_filter(mut self, filter: impl TxFilter + 'static) -> Self {
        self.tx_filters.push(Box::new(filter));
        self
    }

    /// Adds a block filter, run after the previously added ones.
    pub fn with_block_filter(mut self, filter: impl BlockFilter + 'static) -> Self {
        self.block_filters.push(Box::new(filter));
        self
    }

    /// Returns the sequencer configuration.
    pub const fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Returns the count of queued transactions.
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Queues a transaction for the next block.
    pub fn submit_transaction(&self, tx: L2Transaction) -> Result<(), SequencerError> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.config.queue_size {
            tracing::debug!(target: "rollup::sequencer", hash = %tx.hash(), "transaction queue is full");
            return Err(SequencerError::QueueFull);
        }
        queue.push_back(tx);
        self.metrics.queue_length.set(queue.len() as f64);
        Ok(())
    }

    /// Handles a new parent chain block.
    pub fn handle_new_parent_block(&self, block_number: u64) {
        self.parent_chain_block_number.fetch_max(block_number, Ordering::Relaxed);
    }

    /// Returns the latest parent chain block number seen by the sequencer.
    pub fn parent_chain_block_number(&self) -> u64 {
        self.parent_chain_block_number.load(Ordering::Relaxed)
    }

    /// Produces a block out of the queued transactions.
    ///
    /// Each candidate is checked by the transaction filters: rejected transactions are dropped and
    /// reported in the outcome. The survivors are then checked as a whole by the block filters. A
    /// block filter rejection drops every candidate and returns
    /// [`SequencerError::BlockFiltered`].
    #[tracing::instrument(skip_all, fields(timestamp = timestamp))]
    pub fn produce_block(&self, timestamp: u64) -> Result<ProductionOutcome, SequencerError> {
        let started = Instant::now();
        let candidates: Vec<_> = {
            let mut queue = self.queue.lock();
            let take = queue.len().min(self.config.max_txs_per_block);
            let candidates = queue.drain(..take).collect();
            self.metrics.queue_length.set(queue.len() as f64);
            candidates
        };

        let mut transactions = Vec::with_capacity(candidates.len());
        let mut filter_errors = Vec::new();
        'candidates: for tx in candidates {
            for filter in &self.tx_filters {
                if let Err(rejection) = filter.check_transaction(&tx) {
                    let error = TxFilterError { tx_hash: tx.hash(), filter: filter.name(), rejection };
                    tracing::debug!(target: "rollup::sequencer", %error, "dropping filtered transaction");
                    filter_errors.push(error);
                    continue 'candidates;
                }
            }
            transactions.push(tx);
        }
        self.metrics.tx_filter_rejections.increment(filter_errors.len() as u64);

        if transactions.is_empty() {
            return Ok(ProductionOutcome::Empty { filter_errors });
        }

        for filter in &self.block_filters {
            if let Err(rejection) = filter.check_block(&transactions) {
                tracing::warn!(target: "rollup::sequencer", filter = filter.name(), %rejection, dropped = transactions.len(), "block rejected by filter");
                self.metrics.block_filter_rejections.increment(1);
                return Err(SequencerError::BlockFiltered {
                    filter: filter.name(),
                    rejection,
                    dropped: transactions.len(),
                });
            }
        }

        let header = MessageHeader {
            kind: MessageKind::L2Message,
            poster: BATCH_POSTER_ADDRESS,
            block_number: self.parent_chain_block_number.load(Ordering::Relaxed),
            timestamp,
            request_id: None,
            base_fee: U256::ZERO,
        };
        let message = Message::new(header, encode_l2_transactions(&transactions));

        let index = {
            let mut store = self.store.lock();
            let delayed_messages_read = store.delayed_messages_read();
            store.push(MessageWithMetadata::new(message, delayed_messages_read))?
        };

        self.metrics.blocks_produced.increment(1);
        self.metrics.transactions_sequenced.increment(transactions.len() as u64);
        self.metrics.block_production_duration.record(started.elapsed().as_secs_f64());
        tracing::debug!(target: "rollup::sequencer", index, txs = transactions.len(), filtered = filter_errors.len(), "produced block");

        Ok(ProductionOutcome::Produced(SequencedBlock { index, transactions, filter_errors }))
    }

    /// Spawns the block production loop, producing a block every
    /// [`SequencerConfig::block_time`].
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.block_time);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(target: "rollup::sequencer", block_time = ?self.config.block_time, "starting block production");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.queued() == 0 {
                continue;
            }

            let timestamp =
                SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs());
            match self.produce_block(timestamp) {
                Ok(_) => {}
                Err(err) if err.is_transient() => {
                    tracing::debug!(target: "rollup::sequencer", %err, "block production will be retried");
                }
                Err(err) => {
                    tracing::warn!(target: "rollup::sequencer", %err, "failed to produce block");
                }
            }
        }

        tracing::info!(target: "rollup::sequencer", "block production stopped");
    }
}
