use crate::CanRetry;
use rollup_db::{DatabaseError, MessageStoreError};
use rollup_extractor::{ExtractorError, ReaderError};
use rollup_primitives::MessageIndex;

/// An error raised while resolving a reorg.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReorgError {
    /// No stored derivation state is canonical within the reorg detection depth.
    #[error("no common ancestor within {depth} parent chain blocks below block {from}")]
    ReorgTooDeep {
        /// The parent chain block the search started at.
        from: u64,
        /// The reorg detection depth.
        depth: u64,
    },
    /// The common ancestor drops finalized messages.
    #[error("reorg to message count {count} drops finalized messages, finalized count is {finalized}")]
    ReorgBelowFinalized {
        /// The message count of the common ancestor.
        count: u64,
        /// The finalized message count.
        finalized: u64,
    },
    /// No stored derivation state precedes the diverging message.
    #[error("no derivation state to resume from before message {0}")]
    MissingCheckpoint(MessageIndex),
    /// An error returned by the parent chain reader.
    #[error(transparent)]
    Reader(#[from] ReaderError),
    /// An error returned by the extraction database.
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// An error returned by the message store.
    #[error(transparent)]
    MessageStore(#[from] MessageStoreError),
}

impl ReorgError {
    /// Returns `true` if the error must halt the node.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Reader(_))
    }
}

impl CanRetry for ReorgError {
    fn can_retry(&self) -> bool {
        !self.is_fatal()
    }
}

/// An error type for the [`crate::ChainOrchestrator`].
#[derive(Debug, thiserror::Error)]
pub enum ChainOrchestratorError {
    /// An error raised by the extractor.
    #[error(transparent)]
    Extractor(#[from] ExtractorError),
    /// An error raised while resolving a reorg.
    #[error(transparent)]
    Reorg(#[from] ReorgError),
}

impl ChainOrchestratorError {
    /// Returns `true` if the error must halt the node.
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Extractor(err) => err.is_fatal(),
            Self::Reorg(err) => err.is_fatal(),
        }
    }
}

impl CanRetry for ChainOrchestratorError {
    fn can_retry(&self) -> bool {
        match self {
            Self::Extractor(err) => err.is_transient(),
            Self::Reorg(err) => err.can_retry(),
        }
    }
}
