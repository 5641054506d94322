use alloy_primitives::U256;
use rollup_retryables::RetryableConfig;

/// The default count of blocks moved into the ancient store per batch.
pub const DEFAULT_FREEZER_BATCH_SIZE: u64 = 64;

/// The default count of messages between two execution state snapshots kept for frozen blocks.
pub const DEFAULT_STATE_SNAPSHOT_INTERVAL: u64 = 1024;

/// The base fee of L2 blocks, in wei.
pub const DEFAULT_L2_BASE_FEE: u64 = 100_000_000;

/// The configuration of the [`crate::ExecutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// The L2 chain id.
    pub chain_id: u64,
    /// The number of the block produced by the first message.
    pub genesis_block_number: u64,
    /// The timestamp of the genesis block.
    pub genesis_timestamp: u64,
    /// The L2 base fee.
    pub base_fee: U256,
    /// Whether the safe tier waits for block validation.
    pub safe_wait_for_validator: bool,
    /// Whether the finalized tier waits for block validation.
    pub finalized_wait_for_validator: bool,
    /// The count of blocks moved into the ancient store per batch.
    pub freezer_batch_size: u64,
    /// The count of messages between two execution states kept once their blocks are frozen.
    pub state_snapshot_interval: u64,
    /// The retryable ticket parameters.
    pub retryables: RetryableConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            genesis_block_number: 0,
            genesis_timestamp: 0,
            base_fee: U256::from(DEFAULT_L2_BASE_FEE),
            safe_wait_for_validator: false,
            finalized_wait_for_validator: false,
            freezer_batch_size: DEFAULT_FREEZER_BATCH_SIZE,
            state_snapshot_interval: DEFAULT_STATE_SNAPSHOT_INTERVAL,
            retryables: RetryableConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Returns `true` if any finality tier waits for block validation.
    pub const fn waits_for_validator(&self) -> bool {
        self.safe_wait_for_validator || self.finalized_wait_for_validator
    }
}
