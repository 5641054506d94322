use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;

/// The metrics for the [`super::ExecutionEngine`].
#[derive(Metrics, Clone)]
#[metrics(scope = "engine")]
pub(crate) struct EngineMetrics {
    /// The count of executed messages.
    pub messages_executed: Counter,
    /// The count of executed messages discarded because of a concurrent reorg.
    pub stale_messages: Counter,
    /// The duration of a message execution.
    pub message_execution_duration: Histogram,
    /// The count of applied finality updates.
    pub finality_updates: Counter,
    /// The count of finality updates rejected for a block hash mismatch.
    pub finality_mismatches: Counter,
    /// The count of blocks moved into the ancient store.
    pub blocks_frozen: Counter,
    /// The count of rollbacks.
    pub rollbacks: Counter,
    /// The head block number.
    pub head_block: Gauge,
    /// The finalized block number.
    pub finalized_block: Gauge,
}
