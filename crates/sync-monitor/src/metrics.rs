use metrics::{Counter, Gauge};
use metrics_derive::Metrics;

/// The metrics for the [`super::SyncMonitor`].
#[derive(Metrics, Clone)]
#[metrics(scope = "sync_monitor")]
pub(crate) struct SyncMonitorMetrics {
    /// The count of finality pushes accepted by the target.
    pub pushes: Counter,
    /// The count of finality pushes that failed.
    pub failed_pushes: Counter,
    /// The message index of the last pushed finalized tier.
    pub finalized_message_index: Gauge,
    /// The message index of the last pushed safe tier.
    pub safe_message_index: Gauge,
}
