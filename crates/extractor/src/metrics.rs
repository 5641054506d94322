use metrics::{Counter, Gauge};
use metrics_derive::Metrics;

/// The metrics for the [`super::Extractor`].
#[derive(Metrics, Clone)]
#[metrics(scope = "extractor")]
pub struct ExtractorMetrics {
    /// A counter on the parent chain blocks folded.
    pub blocks_processed: Counter,
    /// A counter on the messages extracted.
    pub messages_extracted: Counter,
    /// A counter on the delayed messages seen.
    pub delayed_messages_seen: Counter,
    /// A counter on the reorgs detected.
    pub reorgs_detected: Counter,
    /// A counter on the batch data retrievals that failed.
    pub data_unavailable: Counter,
    /// The number of the last folded parent chain block.
    pub head_block: Gauge,
}
