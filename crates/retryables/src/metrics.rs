use metrics::Counter;
use metrics_derive::Metrics;

/// The metrics for the [`super::RetryableStateMachine`].
#[derive(Metrics, Clone)]
#[metrics(scope = "retryables")]
pub struct RetryableMetrics {
    /// A counter on the tickets created.
    pub tickets_created: Counter,
    /// A counter on the redeem attempts.
    pub redeem_attempts: Counter,
    /// A counter on the failed redeem attempts.
    pub redeem_failures: Counter,
    /// A counter on the expired tickets.
    pub tickets_expired: Counter,
}
