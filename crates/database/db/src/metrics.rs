use metrics::Counter;
use metrics_derive::Metrics;

/// The metrics for the [`super::MessageStore`].
#[derive(Metrics, Clone)]
#[metrics(scope = "message_store")]
pub(crate) struct MessageStoreMetrics {
    /// The count of appended messages.
    pub appended_messages: Counter,
    /// The count of reorgs applied to the store.
    pub reorgs: Counter,
    /// The count of messages dropped by reorgs.
    pub truncated_messages: Counter,
}
