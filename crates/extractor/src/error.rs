use alloy_primitives::B256;
use rollup_codec::DecodingError;
use rollup_db::{DatabaseError, MessageStoreError};

/// A [`Result`] that uses [`ExtractorError`] as the error type.
pub(crate) type ExtractorResult<T> = Result<T, ExtractorError>;

/// An error that occurred while extracting messages from the parent chain.
#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    /// The block does not extend the last folded block.
    #[error("parent chain reorg detected at block {number}: expected parent {expected}, got {got}")]
    ParentChainReorgDetected {
        /// The number of the block that failed to link.
        number: u64,
        /// The hash of the last folded block.
        expected: B256,
        /// The parent hash of the block.
        got: B256,
    },
    /// The data referenced by a batch could not be retrieved.
    #[error("batch data unavailable: {0}")]
    DataUnavailable(String),
    /// The parent chain data violates the rollup protocol.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] MalformedMessageError),
    /// A block expected to exist on the parent chain is missing.
    #[error("parent chain block {0} not found")]
    MissingBlock(u64),
    /// A delayed message read by a batch is not stored.
    #[error("delayed message {0} not found")]
    MissingDelayedMessage(u64),
    /// A derivation state expected to be stored is missing.
    #[error("no derivation state for parent chain block {0}")]
    MissingState(u64),
    /// An error returned by the parent chain reader.
    #[error("parent chain reader error: {0}")]
    Reader(#[from] ReaderError),
    /// An error returned by the extraction database.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    /// An error returned by the message store.
    #[error("message store error: {0}")]
    MessageStore(#[from] MessageStoreError),
}

impl ExtractorError {
    /// Returns `true` if the same extraction step should be retried after a backoff.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::DataUnavailable(_) | Self::Reader(_) | Self::MissingBlock(_))
    }

    /// Returns `true` if the error must halt the node.
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::MalformedMessage(_) |
            Self::MissingDelayedMessage(_) |
            Self::MissingState(_) |
            Self::Database(_) => true,
            Self::MessageStore(err) => !err.is_divergence(),
            _ => false,
        }
    }
}

/// The parent chain data violates the rollup protocol.
#[derive(Debug, thiserror::Error)]
pub enum MalformedMessageError {
    /// A batch was posted out of sequence.
    #[error("batch {got} posted while {expected} was expected")]
    BatchSequenceMismatch {
        /// The expected batch sequence number.
        expected: u64,
        /// The posted batch sequence number.
        got: u64,
    },
    /// A delayed message was added out of sequence.
    #[error("delayed message {got} added while {expected} was expected")]
    DelayedSequenceMismatch {
        /// The expected delayed message sequence number.
        expected: u64,
        /// The added delayed message sequence number.
        got: u64,
    },
    /// A delayed message does not extend the delayed inbox accumulator.
    #[error("delayed message {seq_num} has accumulator {got}, expected {expected}")]
    DelayedAccumulatorMismatch {
        /// The delayed message sequence number.
        seq_num: u64,
        /// The accumulator of the extraction state.
        expected: B256,
        /// The accumulator carried by the event.
        got: B256,
    },
    /// The batch header disagrees with the batch event.
    #[error("batch {seq_num} header reads {header} delayed messages, event reads {event}")]
    AfterDelayedMismatch {
        /// The batch sequence number.
        seq_num: u64,
        /// The delayed message count of the header.
        header: u64,
        /// The delayed message count of the event.
        event: u64,
    },
    /// The batch reads delayed messages that were never added.
    #[error("batch {seq_num} reads {after_delayed} delayed messages, only {seen} seen")]
    AfterDelayedExceedsSeen {
        /// The batch sequence number.
        seq_num: u64,
        /// The delayed message count read by the batch.
        after_delayed: u64,
        /// The count of delayed messages seen.
        seen: u64,
    },
    /// No installed data availability reader accepts the header flag.
    #[error("no data availability reader for header flag {0:#04x}")]
    NoDataAvailabilityReader(u8),
    /// The data availability reader rejected the batch certificate.
    #[error("invalid data availability payload: {0}")]
    InvalidDataAvailabilityPayload(String),
    /// The batch failed to decode.
    #[error(transparent)]
    Decoding(#[from] DecodingError),
}

/// An error returned by a [`crate::ParentChainReader`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReaderError {
    /// The request to the parent chain failed.
    #[error("parent chain request failed: {0}")]
    Request(String),
    /// The parent chain has no block for the tag yet.
    #[error("no {0} block on the parent chain")]
    MissingTag(&'static str),
}

/// An error returned by a [`crate::DataAvailabilityReader`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataAvailabilityError {
    /// The data could not be retrieved at this time.
    #[error("data unavailable: {0}")]
    Unavailable(String),
    /// The certificate is invalid.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),
}

impl From<DataAvailabilityError> for ExtractorError {
    fn from(value: DataAvailabilityError) -> Self {
        match value {
            DataAvailabilityError::Unavailable(msg) => Self::DataUnavailable(msg),
            DataAvailabilityError::InvalidCertificate(msg) => {
                MalformedMessageError::InvalidDataAvailabilityPayload(msg).into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ExtractorError::DataUnavailable("timeout".into()).is_transient());
        assert!(!ExtractorError::DataUnavailable("timeout".into()).is_fatal());

        let malformed: ExtractorError =
            MalformedMessageError::BatchSequenceMismatch { expected: 1, got: 2 }.into();
        assert!(malformed.is_fatal());

        let diverged: ExtractorError = MessageStoreError::Diverged { index: 3 }.into();
        assert!(!diverged.is_fatal());

        let invalid: ExtractorError = DataAvailabilityError::InvalidCertificate("sig".into()).into();
        assert!(matches!(
            invalid,
            ExtractorError::MalformedMessage(MalformedMessageError::InvalidDataAvailabilityPayload(_))
        ));
    }
}
