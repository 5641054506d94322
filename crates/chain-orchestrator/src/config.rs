use crate::Retry;
use std::time::Duration;

/// The default count of parent chain blocks searched for a common ancestor.
pub const DEFAULT_REORG_DETECTION_DEPTH: u64 = 64;

/// The default interval between two extraction attempts at the head of the parent chain, in
/// milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Configuration for the [`crate::ChainOrchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOrchestratorConfig {
    /// The count of parent chain blocks searched for a common ancestor on a reorg.
    pub reorg_detection_depth: u64,
    /// The interval between two extraction attempts once the head of the parent chain is
    /// reached, unless a new head is announced earlier.
    pub poll_interval: Duration,
    /// The backoff applied to transient failures.
    pub retry: Retry,
}

impl Default for ChainOrchestratorConfig {
    fn default() -> Self {
        Self {
            reorg_detection_depth: DEFAULT_REORG_DETECTION_DEPTH,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            retry: Retry::default(),
        }
    }
}
