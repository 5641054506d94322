use alloy_primitives::Address;
use std::time::Duration;

/// The default interval between two produced blocks, in milliseconds.
pub const DEFAULT_BLOCK_TIME_MS: u64 = 250;

/// The default maximum count of transactions in a block.
pub const DEFAULT_MAX_TXS_PER_BLOCK: usize = 1024;

/// The default maximum size of the calldata of a transaction.
pub const DEFAULT_MAX_TX_DATA_SIZE: usize = 95_000;

/// The default capacity of the transaction queue.
pub const DEFAULT_QUEUE_SIZE: usize = 1024;

/// Configuration for the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerConfig {
    /// The interval between two block production ticks.
    pub block_time: Duration,
    /// The maximum count of transactions taken from the queue per block.
    pub max_txs_per_block: usize,
    /// The maximum size of the calldata of a transaction.
    pub max_tx_data_size: usize,
    /// The capacity of the transaction queue.
    pub queue_size: usize,
    /// The senders allowed to submit transactions. Empty allows every sender.
    pub sender_whitelist: Vec<Address>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            block_time: Duration::from_millis(DEFAULT_BLOCK_TIME_MS),
            max_txs_per_block: DEFAULT_MAX_TXS_PER_BLOCK,
            max_tx_data_size: DEFAULT_MAX_TX_DATA_SIZE,
            queue_size: DEFAULT_QUEUE_SIZE,
            sender_whitelist: Vec::new(),
        }
    }
}
