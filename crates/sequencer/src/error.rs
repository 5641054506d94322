use alloy_primitives::TxHash;
use rollup_db::MessageStoreError;

/// The reason a filter rejected a transaction or a block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FilterRejection(pub String);

impl FilterRejection {
    /// Returns a new [`FilterRejection`].
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// A transaction dropped by a transaction filter. Recorded with the produced block, it never
/// aborts block production.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transaction {tx_hash} rejected by {filter}: {rejection}")]
pub struct TxFilterError {
    /// The hash of the rejected transaction.
    pub tx_hash: TxHash,
    /// The name of the rejecting filter.
    pub filter: &'static str,
    /// The reason of the rejection.
    pub rejection: FilterRejection,
}

/// An error type for the sequencer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    /// A block filter rejected the candidate transactions.
    #[error("block rejected by {filter}: {rejection}")]
    BlockFiltered {
        /// The name of the rejecting filter.
        filter: &'static str,
        /// The reason of the rejection.
        rejection: FilterRejection,
        /// The count of candidate transactions dropped with the block.
        dropped: usize,
    },
    /// The transaction queue is at capacity.
    #[error("transaction queue is full")]
    QueueFull,
    /// The sequencer encountered an error appending to the message store.
    #[error("failed to append sequenced message: {0}")]
    MessageStore(#[from] MessageStoreError),
}

impl SequencerError {
    /// Returns `true` if the submission or the block can be retried.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::QueueFull | Self::MessageStore(MessageStoreError::SequenceMismatch { .. })
        )
    }
}
