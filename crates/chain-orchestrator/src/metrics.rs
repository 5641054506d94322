use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// The metrics for the [`super::ReorgCoordinator`].
#[derive(Metrics, Clone)]
#[metrics(scope = "orchestrator")]
pub(crate) struct ReorgMetrics {
    /// The count of resolved reorgs.
    pub reorgs: Counter,
    /// The count of messages dropped by a reorg.
    pub reorg_depth: Histogram,
    /// The count of rollbacks forced by an operator.
    pub forced_rollbacks: Counter,
}

/// The metrics for the [`super::ChainOrchestrator`].
#[derive(Metrics, Clone)]
#[metrics(scope = "orchestrator")]
pub(crate) struct ChainOrchestratorMetrics {
    /// The count of transient errors backed off from.
    pub transient_errors: Counter,
    /// The count of parent chain heads announced.
    pub new_heads: Counter,
}
