//! Primitive types for the rollup node.

mod accumulator;
pub use accumulator::accumulate;

pub use block::BlockInfo;
mod block;

pub mod fatal;
pub use fatal::{fatal_error_channel, FatalError, FatalErrorReceiver, FatalErrorSender};

pub use finality::{ConsensusFinality, FinalityData};
mod finality;

pub use message::{
    Message, MessageHeader, MessageIndex, MessageKind, MessageResult, MessageWithMetadata,
    BATCH_POSTER_ADDRESS,
};
mod message;

pub use parent_chain::{
    DelayedInboxMessage, ParentChainBlock, ParentChainEvent, ParentChainEventKind,
    ParentChainHeader, SequencerBatch,
};
mod parent_chain;

pub use state::{DerivationState, DERIVATION_STATE_VERSION};
mod state;

pub use transaction::L2Transaction;
mod transaction;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
