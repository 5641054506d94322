use crate::FinalityTier;
use alloy_primitives::B256;
use rollup_db::{AncientError, MessageStoreError};
use rollup_primitives::MessageIndex;

/// The result type of the [`crate::ExecutionEngine`].
pub type EngineResult<T> = Result<T, EngineError>;

/// The error type for the [`crate::ExecutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A finality tier was set to the zero hash.
    #[error("invalid {0} finality data: zero block hash")]
    InvalidFinalityHash(FinalityTier),
    /// The block hash of a finality tier differs from the executed block.
    #[error("{tier} finality block hash mismatch at message {msg_idx}: executed {executed}, got {got}")]
    FinalityBlockHashMismatch {
        /// The finality tier.
        tier: FinalityTier,
        /// The message index.
        msg_idx: MessageIndex,
        /// The hash of the executed block.
        executed: B256,
        /// The hash supplied with the finality data.
        got: B256,
    },
    /// A finality tier waits for block validation but no validated finality was supplied.
    #[error("block validator not set")]
    ValidatorNotSet,
    /// The block is not executed.
    #[error("block {0} not found")]
    BlockNotFound(u64),
    /// The message is not executed.
    #[error("message {0} not executed")]
    MessageNotExecuted(MessageIndex),
    /// No finalized block is set.
    #[error("finalized block not found")]
    FinalizedBlockNotFound,
    /// No safe block is set.
    #[error("safe block not found")]
    SafeBlockNotFound,
    /// An error from the ancient store.
    #[error(transparent)]
    Ancient(#[from] AncientError),
    /// An error from the message store.
    #[error(transparent)]
    MessageStore(#[from] MessageStoreError),
}

impl EngineError {
    /// Returns `true` if the error must halt the node.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::FinalityBlockHashMismatch { .. } | Self::Ancient(_))
    }

    /// Returns `true` if the call can succeed once the engine catches up.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::BlockNotFound(_) | Self::MessageNotExecuted(_))
    }
}
