use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;

/// The metrics for the [`super::Sequencer`].
#[derive(Metrics, Clone)]
#[metrics(scope = "sequencer")]
pub struct SequencerMetrics {
    /// The count of produced blocks.
    pub blocks_produced: Counter,
    /// The count of sequenced transactions.
    pub transactions_sequenced: Counter,
    /// The count of transactions rejected by a transaction filter.
    pub tx_filter_rejections: Counter,
    /// The count of blocks rejected by a block filter.
    pub block_filter_rejections: Counter,
    /// The count of queued transactions.
    pub queue_length: Gauge,
    /// The block production duration.
    pub block_production_duration: Histogram,
}
