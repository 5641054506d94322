use crate::constants;
use alloy_primitives::{Address, U256};
use rollup_chain_orchestrator::{
    ChainOrchestratorConfig, Retry, DEFAULT_POLL_INTERVAL_MS, DEFAULT_REORG_DETECTION_DEPTH,
};
use rollup_engine::{
    EngineConfig, DEFAULT_FREEZER_BATCH_SIZE, DEFAULT_L2_BASE_FEE, DEFAULT_STATE_SNAPSHOT_INTERVAL,
};
use rollup_extractor::ExtractorConfig;
use rollup_retryables::{RetryableConfig, DEFAULT_RETRYABLE_LIFETIME, TX_GAS};
use rollup_sequencer::{
    SequencerConfig, DEFAULT_BLOCK_TIME_MS, DEFAULT_MAX_TXS_PER_BLOCK, DEFAULT_MAX_TX_DATA_SIZE,
    DEFAULT_QUEUE_SIZE,
};
use rollup_sync_monitor::{SyncMonitorConfig, DEFAULT_FINALITY_PUSH_INTERVAL_MS};
use std::time::Duration;

/// The arguments of the rollup node.
#[derive(Debug, Clone, Default, clap::Parser)]
#[command(
    name = "rollup-node",
    version,
    about = "Derives and executes rollup messages posted to a parent chain"
)]
pub struct RollupNodeArgs {
    /// Chain args.
    #[command(flatten)]
    pub chain_args: ChainArgs,
    /// Execution engine args.
    #[command(flatten)]
    pub engine_args: EngineArgs,
    /// Extractor args.
    #[command(flatten)]
    pub extractor_args: ExtractorArgs,
    /// Sync monitor args.
    #[command(flatten)]
    pub sync_monitor_args: SyncMonitorArgs,
    /// Retryable ticket args.
    #[command(flatten)]
    pub retryable_args: RetryableArgs,
    /// Sequencer args.
    #[command(flatten)]
    pub sequencer_args: SequencerArgs,
    /// Dev parent chain args.
    #[command(flatten)]
    pub dev_args: DevArgs,
}

impl RollupNodeArgs {
    /// Validates the arguments.
    pub fn validate(&self) -> eyre::Result<()> {
        if self.sync_monitor_args.finality_push_interval == 0 {
            eyre::bail!("--sync-monitor.finality-push-interval must be positive");
        }
        if self.extractor_args.poll_interval == 0 {
            eyre::bail!("--extractor.poll-interval must be positive");
        }
        if self.sequencer_args.sequencer_enabled && self.sequencer_args.block_time == 0 {
            eyre::bail!("--sequencer.block-time must be positive");
        }
        if self.engine_args.freezer_batch_size == 0 {
            eyre::bail!("--engine.freezer-batch-size must be positive");
        }
        if self.engine_args.state_snapshot_interval == 0 {
            eyre::bail!("--engine.state-snapshot-interval must be positive");
        }
        Ok(())
    }

    /// Returns the execution engine configuration.
    pub const fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            chain_id: self.chain_args.chain_id,
            genesis_block_number: self.chain_args.genesis_block_number,
            genesis_timestamp: self.chain_args.genesis_timestamp,
            base_fee: U256::from_limbs([self.engine_args.base_fee, 0, 0, 0]),
            safe_wait_for_validator: self.engine_args.safe_wait_for_validator,
            finalized_wait_for_validator: self.engine_args.finalized_wait_for_validator,
            freezer_batch_size: self.engine_args.freezer_batch_size,
            state_snapshot_interval: self.engine_args.state_snapshot_interval,
            retryables: RetryableConfig {
                auto_redeem_gas_threshold: self.retryable_args.auto_redeem_gas_threshold,
                lifetime: self.retryable_args.lifetime,
            },
        }
    }

    /// Returns the extractor configuration.
    pub const fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            parent_chain_id: self.chain_args.parent_chain_id,
            genesis_block_number: self.chain_args.parent_chain_genesis_block_number,
            sequencer_inbox: self.chain_args.sequencer_inbox,
            bridge: self.chain_args.bridge,
        }
    }

    /// Returns the chain orchestrator configuration.
    pub fn chain_orchestrator_config(&self) -> ChainOrchestratorConfig {
        ChainOrchestratorConfig {
            reorg_detection_depth: self.extractor_args.reorg_detection_depth,
            poll_interval: Duration::from_millis(self.extractor_args.poll_interval),
            retry: Retry {
                initial_delay_ms: self.extractor_args.retry_initial_delay,
                max_delay_ms: self.extractor_args.retry_max_delay,
                ..Default::default()
            },
        }
    }

    /// Returns the sync monitor configuration.
    pub fn sync_monitor_config(&self) -> SyncMonitorConfig {
        SyncMonitorConfig {
            finality_push_interval: Duration::from_millis(
                self.sync_monitor_args.finality_push_interval,
            ),
            ..Default::default()
        }
    }

    /// Returns the sequencer configuration.
    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            block_time: Duration::from_millis(self.sequencer_args.block_time),
            max_txs_per_block: self.sequencer_args.max_txs_per_block,
            max_tx_data_size: self.sequencer_args.max_tx_data_size,
            queue_size: self.sequencer_args.queue_size,
            sender_whitelist: self.sequencer_args.sender_whitelist.clone(),
        }
    }
}

/// The chain arguments.
#[derive(Debug, Clone, clap::Args)]
pub struct ChainArgs {
    /// The L2 chain id.
    #[arg(long = "chain.id", id = "chain_id", default_value_t = constants::DEFAULT_CHAIN_ID)]
    pub chain_id: u64,
    /// The number of the block produced by the first message.
    #[arg(long = "chain.genesis-block-number", default_value_t = 0)]
    pub genesis_block_number: u64,
    /// The timestamp of the genesis block.
    #[arg(long = "chain.genesis-timestamp", default_value_t = 0)]
    pub genesis_timestamp: u64,
    /// The parent chain id.
    #[arg(long = "chain.parent-chain-id", default_value_t = constants::DEFAULT_PARENT_CHAIN_ID)]
    pub parent_chain_id: u64,
    /// The parent chain block the extraction starts at.
    #[arg(long = "chain.parent-chain-genesis-block-number", default_value_t = 0)]
    pub parent_chain_genesis_block_number: u64,
    /// The sequencer inbox address on the parent chain.
    #[arg(long = "chain.sequencer-inbox", default_value_t = constants::DEFAULT_SEQUENCER_INBOX)]
    pub sequencer_inbox: Address,
    /// The bridge address on the parent chain.
    #[arg(long = "chain.bridge", default_value_t = constants::DEFAULT_BRIDGE)]
    pub bridge: Address,
}

impl Default for ChainArgs {
    fn default() -> Self {
        Self {
            chain_id: constants::DEFAULT_CHAIN_ID,
            genesis_block_number: 0,
            genesis_timestamp: 0,
            parent_chain_id: constants::DEFAULT_PARENT_CHAIN_ID,
            parent_chain_genesis_block_number: 0,
            sequencer_inbox: constants::DEFAULT_SEQUENCER_INBOX,
            bridge: constants::DEFAULT_BRIDGE,
        }
    }
}

/// The execution engine arguments.
#[derive(Debug, Clone, clap::Args)]
pub struct EngineArgs {
    /// Whether the safe block waits for block validation.
    #[arg(long = "engine.safe-wait-for-validator", default_value_t = false)]
    pub safe_wait_for_validator: bool,
    /// Whether the finalized block waits for block validation.
    #[arg(long = "engine.finalized-wait-for-validator", default_value_t = false)]
    pub finalized_wait_for_validator: bool,
    /// The count of finalized blocks moved into the ancient store per batch.
    #[arg(long = "engine.freezer-batch-size", default_value_t = DEFAULT_FREEZER_BATCH_SIZE)]
    pub freezer_batch_size: u64,
    /// The count of messages between two execution states kept for frozen blocks.
    #[arg(long = "engine.state-snapshot-interval", default_value_t = DEFAULT_STATE_SNAPSHOT_INTERVAL)]
    pub state_snapshot_interval: u64,
    /// The L2 base fee, in wei.
    #[arg(long = "engine.base-fee", default_value_t = DEFAULT_L2_BASE_FEE)]
    pub base_fee: u64,
}

impl Default for EngineArgs {
    fn default() -> Self {
        Self {
            safe_wait_for_validator: false,
            finalized_wait_for_validator: false,
            freezer_batch_size: DEFAULT_FREEZER_BATCH_SIZE,
            state_snapshot_interval: DEFAULT_STATE_SNAPSHOT_INTERVAL,
            base_fee: DEFAULT_L2_BASE_FEE,
        }
    }
}

/// The extractor arguments.
#[derive(Debug, Clone, clap::Args)]
pub struct ExtractorArgs {
    /// The count of parent chain blocks searched for a common ancestor on a reorg.
    #[arg(long = "extractor.reorg-detection-depth", default_value_t = DEFAULT_REORG_DETECTION_DEPTH)]
    pub reorg_detection_depth: u64,
    /// The interval between two extraction attempts at the head of the parent chain (milliseconds).
    #[arg(long = "extractor.poll-interval", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval: u64,
    /// The initial backoff after a transient extraction failure (milliseconds).
    #[arg(long = "extractor.retry-initial-delay", default_value_t = 50)]
    pub retry_initial_delay: u64,
    /// The maximum backoff after consecutive transient extraction failures (milliseconds).
    #[arg(long = "extractor.retry-max-delay", default_value_t = 10_000)]
    pub retry_max_delay: u64,
}

impl Default for ExtractorArgs {
    fn default() -> Self {
        Self {
            reorg_detection_depth: DEFAULT_REORG_DETECTION_DEPTH,
            poll_interval: DEFAULT_POLL_INTERVAL_MS,
            retry_initial_delay: 50,
            retry_max_delay: 10_000,
        }
    }
}

/// The sync monitor arguments.
#[derive(Debug, Clone, clap::Args)]
pub struct SyncMonitorArgs {
    /// The interval between two finality pushes into the execution engine (milliseconds).
    #[arg(
        long = "sync-monitor.finality-push-interval",
        default_value_t = DEFAULT_FINALITY_PUSH_INTERVAL_MS
    )]
    pub finality_push_interval: u64,
}

impl Default for SyncMonitorArgs {
    fn default() -> Self {
        Self { finality_push_interval: DEFAULT_FINALITY_PUSH_INTERVAL_MS }
    }
}

/// The retryable ticket arguments.
#[derive(Debug, Clone, clap::Args)]
pub struct RetryableArgs {
    /// The minimum gas a submission must provide to schedule an auto-redeem.
    #[arg(long = "retryables.auto-redeem-gas-threshold", default_value_t = TX_GAS)]
    pub auto_redeem_gas_threshold: u64,
    /// The lifetime of a ticket (seconds).
    #[arg(long = "retryables.lifetime", default_value_t = DEFAULT_RETRYABLE_LIFETIME)]
    pub lifetime: u64,
}

impl Default for RetryableArgs {
    fn default() -> Self {
        Self { auto_redeem_gas_threshold: TX_GAS, lifetime: DEFAULT_RETRYABLE_LIFETIME }
    }
}

/// The sequencer arguments.
#[derive(Debug, Clone, clap::Args)]
pub struct SequencerArgs {
    /// Enable the sequencer.
    #[arg(long = "sequencer.enabled", default_value_t = false)]
    pub sequencer_enabled: bool,
    /// The block time of the sequencer (milliseconds).
    #[arg(
        long = "sequencer.block-time",
        id = "sequencer_block_time",
        value_name = "SEQUENCER_BLOCK_TIME",
        default_value_t = DEFAULT_BLOCK_TIME_MS
    )]
    pub block_time: u64,
    /// The maximum count of transactions per block.
    #[arg(long = "sequencer.max-txs-per-block", default_value_t = DEFAULT_MAX_TXS_PER_BLOCK)]
    pub max_txs_per_block: usize,
    /// The maximum size of the calldata of a transaction.
    #[arg(long = "sequencer.max-tx-data-size", default_value_t = DEFAULT_MAX_TX_DATA_SIZE)]
    pub max_tx_data_size: usize,
    /// The capacity of the transaction queue.
    #[arg(long = "sequencer.queue-size", default_value_t = DEFAULT_QUEUE_SIZE)]
    pub queue_size: usize,
    /// The senders allowed to submit transactions, comma separated. Every sender is allowed when
    /// empty.
    #[arg(long = "sequencer.sender-whitelist", value_delimiter = ',')]
    pub sender_whitelist: Vec<Address>,
}

impl Default for SequencerArgs {
    fn default() -> Self {
        Self {
            sequencer_enabled: false,
            block_time: DEFAULT_BLOCK_TIME_MS,
            max_txs_per_block: DEFAULT_MAX_TXS_PER_BLOCK,
            max_tx_data_size: DEFAULT_MAX_TX_DATA_SIZE,
            queue_size: DEFAULT_QUEUE_SIZE,
            sender_whitelist: Vec::new(),
        }
    }
}

/// The dev parent chain arguments.
#[derive(Debug, Clone, clap::Args)]
pub struct DevArgs {
    /// Run against an in-process parent chain producing empty blocks.
    #[arg(long = "dev", default_value_t = false)]
    pub dev: bool,
    /// The block time of the dev parent chain (milliseconds).
    #[arg(long = "dev.block-time", default_value_t = constants::DEFAULT_DEV_BLOCK_TIME_MS)]
    pub block_time: u64,
}

impl Default for DevArgs {
    fn default() -> Self {
        Self { dev: false, block_time: constants::DEFAULT_DEV_BLOCK_TIME_MS }
    }
}
