use rollup_engine::EngineError;
use rollup_extractor::ReaderError;
use rollup_primitives::MessageIndex;

/// An error type for the sync monitor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncMonitorError {
    /// The parent chain could not be queried.
    #[error(transparent)]
    Reader(#[from] ReaderError),
    /// The message a tier points at has no execution result yet.
    #[error("message {0} has no execution result yet")]
    MissingResult(MessageIndex),
    /// The engine rejected the finality data.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The monitor task is no longer running.
    #[error("sync monitor stopped")]
    Stopped,
}

impl SyncMonitorError {
    /// Returns `true` if the error must halt the node.
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Engine(err) => err.is_fatal(),
            _ => false,
        }
    }

    /// Returns `true` if the push should be retried on the next tick.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Reader(_) | Self::MissingResult(_) => true,
            Self::Engine(err) => !err.is_fatal(),
            Self::Stopped => false,
        }
    }
}
