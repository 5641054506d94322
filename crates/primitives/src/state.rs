use crate::{accumulate, MessageWithMetadata, ParentChainHeader};
use alloy_primitives::{Address, B256};

/// The current version of the [`DerivationState`] layout.
pub const DERIVATION_STATE_VERSION: u16 = 1;

/// The state of message extraction after folding a parent chain block.
///
/// Two nodes holding the same state have derived identical message histories. A state is never
/// mutated once persisted: extraction of the next block works on a copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "arbitrary"), derive(arbitrary::Arbitrary))]
pub struct DerivationState {
    /// The layout version.
    pub version: u16,
    /// The parent chain id.
    pub parent_chain_id: u64,
    /// The number of the last folded parent chain block.
    pub parent_chain_block_number: u64,
    /// The hash of the last folded parent chain block.
    pub parent_chain_block_hash: B256,
    /// The parent hash of the last folded parent chain block.
    pub parent_chain_prev_block_hash: B256,
    /// The sequencer inbox address batches are read from.
    pub batch_posting_target_address: Address,
    /// The bridge address delayed messages are read from.
    pub delayed_message_posting_target_address: Address,
    /// Hash chain over every extracted message.
    pub message_accumulator: B256,
    /// Hash chain over every delayed message seen.
    pub delayed_messages_seen_accumulator: B256,
    /// The sequence number of the next delayed message, i.e. the count of delayed messages seen.
    pub next_delayed_message_seq_num: u64,
    /// The count of delayed messages already included in the message stream.
    pub delayed_messages_read: u64,
    /// The sequence number of the next batch.
    pub next_batch_seq_num: u64,
    /// The count of extracted messages, which is also the index of the next message.
    pub msg_count: u64,
}

impl DerivationState {
    /// Returns the initial state anchored at the provided parent chain block.
    pub fn initial(
        parent_chain_id: u64,
        anchor: &ParentChainHeader,
        batch_posting_target_address: Address,
        delayed_message_posting_target_address: Address,
    ) -> Self {
        Self {
            version: DERIVATION_STATE_VERSION,
            parent_chain_id,
            parent_chain_block_number: anchor.number,
            parent_chain_block_hash: anchor.hash,
            parent_chain_prev_block_hash: anchor.parent_hash,
            batch_posting_target_address,
            delayed_message_posting_target_address,
            ..Default::default()
        }
    }

    /// Folds the message into the accumulator and advances the message count.
    pub fn accumulate_message(&mut self, message: &MessageWithMetadata) {
        self.message_accumulator = accumulate(self.message_accumulator, &message.serialize());
        self.msg_count += 1;
    }

    /// Moves the state to the provided parent chain block.
    pub fn advance_to(&mut self, header: &ParentChainHeader) {
        self.parent_chain_block_number = header.number;
        self.parent_chain_prev_block_hash = header.parent_hash;
        self.parent_chain_block_hash = header.hash;
    }

    /// Returns `true` if the provided header extends the last folded block.
    pub fn is_parent_of(&self, header: &ParentChainHeader) -> bool {
        self.parent_chain_block_number + 1 == header.number &&
            self.parent_chain_block_hash == header.parent_hash
    }

    /// Returns the count of delayed messages seen but not yet read.
    pub const fn pending_delayed_messages(&self) -> u64 {
        self.next_delayed_message_seq_num.saturating_sub(self.delayed_messages_read)
    }
}
