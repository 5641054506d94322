//! The sequencer batch codec for the rollup node.

pub use batch::{BatchHeader, SequencerMessage, BATCH_HEADER_SIZE};
mod batch;

pub mod compression;

pub use error::{CodecError, DecodingError};
mod error;

pub mod flags;

pub use l2_message::{decode_l2_transactions, encode_l2_transactions};
mod l2_message;

mod macros;

pub use segment::Segment;
mod segment;

/// The maximum size of a decompressed batch payload.
pub const MAX_DECOMPRESSED_LEN: usize = 16 * 1024 * 1024;

/// The maximum size of a single L2 message body.
pub const MAX_L2_MESSAGE_SIZE: usize = 256 * 1024;
