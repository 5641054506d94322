use crate::Message;
use alloy_primitives::{Address, Bytes, B256, U256};

/// The header of a parent chain block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "arbitrary"), derive(arbitrary::Arbitrary))]
pub struct ParentChainHeader {
    /// The block number.
    pub number: u64,
    /// The block hash.
    pub hash: B256,
    /// The hash of the parent block.
    pub parent_hash: B256,
    /// The block timestamp.
    pub timestamp: u64,
    /// The block base fee.
    pub base_fee: U256,
}

/// A parent chain block along with the rollup events it emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentChainBlock {
    /// The block header.
    pub header: ParentChainHeader,
    /// The rollup events emitted in the block, in log order.
    pub events: Vec<ParentChainEvent>,
}

impl ParentChainBlock {
    /// Returns a new [`ParentChainBlock`].
    pub const fn new(header: ParentChainHeader, events: Vec<ParentChainEvent>) -> Self {
        Self { header, events }
    }
}

/// A rollup event emitted on the parent chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentChainEvent {
    /// The contract that emitted the event.
    pub address: Address,
    /// The event.
    pub kind: ParentChainEventKind,
}

/// The kinds of rollup events read from the parent chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentChainEventKind {
    /// A sequencer batch was posted to the inbox.
    BatchPosted(SequencerBatch),
    /// A message was added to the delayed inbox.
    DelayedMessageAdded(DelayedInboxMessage),
}

/// A batch posted to the sequencer inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerBatch {
    /// The batch sequence number.
    pub seq_num: u64,
    /// The count of delayed messages the batch reads up to.
    pub after_delayed_count: u64,
    /// The serialized batch: the batch header followed by the payload.
    pub data: Bytes,
}

/// A message added to the delayed inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedInboxMessage {
    /// The delayed message sequence number.
    pub seq_num: u64,
    /// The delayed inbox accumulator before this message was added.
    pub before_inbox_acc: B256,
    /// The message.
    pub message: Message,
}

impl DelayedInboxMessage {
    /// Returns the delayed inbox accumulator after this message was added.
    pub fn after_inbox_acc(&self) -> B256 {
        crate::accumulate(self.before_inbox_acc, self.message.hash().as_slice())
    }
}
