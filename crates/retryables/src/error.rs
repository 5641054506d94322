use alloy_primitives::B256;

/// An error returned by the [`crate::RetryableStateMachine`].
///
/// Every error is an expected outcome of a message or transaction: it is recorded in the block
/// receipts and never aborts the block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryableError {
    /// The submission payload failed to decode.
    #[error("malformed retryable submission: {0}")]
    MalformedSubmission(&'static str),
    /// A ticket with the id already exists.
    #[error("retryable ticket {0} already exists")]
    TicketExists(B256),
    /// No live ticket has the id.
    #[error("retryable ticket {0} not found")]
    TicketNotFound(B256),
}
