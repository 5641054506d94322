use alloy_primitives::B256;
use rollup_primitives::MessageIndex;

/// The error type for the [`crate::MessageStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageStoreError {
    /// A message was submitted out of order or twice.
    #[error("sequence mismatch: expected message index {expected}, got {got}")]
    SequenceMismatch {
        /// The next index of the store.
        expected: MessageIndex,
        /// The submitted index.
        got: MessageIndex,
    },
    /// A reorg was requested below the finalized watermark.
    #[error("reorg to message count {count} is below the finalized message count {finalized}")]
    ReorgBelowFinalized {
        /// The requested message count.
        count: u64,
        /// The finalized message count.
        finalized: u64,
    },
    /// A reorg was requested above the head of the store.
    #[error("reorg to message count {count} is above the message count {head}")]
    ReorgAboveHead {
        /// The requested message count.
        count: u64,
        /// The current message count.
        head: u64,
    },
    /// A message at the index differs from the submitted message.
    #[error("message at index {index} diverged from the stored message")]
    Diverged {
        /// The index of the first diverging message.
        index: MessageIndex,
    },
    /// A message is not present in the store.
    #[error("message at index {0} not found")]
    MessageNotFound(MessageIndex),
}

impl MessageStoreError {
    /// Returns `true` if the error signals that the local chain diverged from the parent chain.
    pub const fn is_divergence(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Returns `true` if the error must halt the node.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ReorgBelowFinalized { .. })
    }
}

/// The error type for the [`crate::MessageExtractionDb`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseError {
    /// The saved state does not extend the head state.
    #[error("state at parent block {got} does not extend head state at parent block {head}")]
    NonContiguousState {
        /// The head state parent block number.
        head: u64,
        /// The saved state parent block number.
        got: u64,
    },
    /// The saved messages do not line up with the state message count.
    #[error("{count} messages cannot end at message count {msg_count} from stored count {stored}")]
    NonContiguousMessages {
        /// The count of saved messages.
        count: usize,
        /// The message count of the saved state.
        msg_count: u64,
        /// The count of stored messages.
        stored: u64,
    },
    /// The saved delayed messages do not line up with the stored delayed messages.
    #[error("delayed message {got} saved while {expected} was expected")]
    NonContiguousDelayedMessages {
        /// The next expected delayed message sequence number.
        expected: u64,
        /// The saved sequence number.
        got: u64,
    },
    /// The state for a parent block hash is not stored.
    #[error("no derivation state for parent chain block {0}")]
    StateNotFound(B256),
}

/// The error type for the [`crate::AncientStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AncientError {
    /// An item was appended out of order.
    #[error("ancient block {got} appended while {expected} was expected")]
    OutOfOrder {
        /// The next expected block number.
        expected: u64,
        /// The appended block number.
        got: u64,
    },
}
