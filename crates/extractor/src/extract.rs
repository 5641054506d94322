use crate::{
    batch::{messages_from_batch, resolve_batch, DelayedMessageLookup},
    error::ExtractorResult,
    DataAvailabilityReader, ExtractorError, MalformedMessageError, ParentChainReader,
};
use rollup_db::MessageExtractionDb;
use rollup_primitives::{
    BlockInfo, DelayedInboxMessage, DerivationState, MessageIndex, MessageWithMetadata,
    ParentChainBlock, ParentChainEventKind, ParentChainHeader,
};
use std::sync::Arc;

/// The result of folding one parent chain block into a [`DerivationState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBlock {
    /// The folded block.
    pub header: ParentChainHeader,
    /// The state after folding the block.
    pub state: DerivationState,
    /// The messages extracted from the block, starting at [`ExtractedBlock::first_index`].
    pub messages: Vec<MessageWithMetadata>,
    /// The delayed messages added in the block.
    pub delayed_messages: Vec<DelayedInboxMessage>,
}

impl ExtractedBlock {
    /// Returns the index of the first extracted message.
    pub fn first_index(&self) -> MessageIndex {
        self.state.msg_count - self.messages.len() as u64
    }

    /// Returns the [`BlockInfo`] of the folded block.
    pub fn block_info(&self) -> BlockInfo {
        BlockInfo::from(&self.header)
    }
}

/// Folds the events of the parent chain block into the state.
///
/// The state is never modified in place: the returned [`ExtractedBlock`] holds the new state.
/// Delayed messages are folded before batches, each in log order. Events emitted by other
/// addresses than the targets of the state are ignored.
#[tracing::instrument(skip_all, fields(block = block.header.number))]
pub async fn extract_messages<DB: MessageExtractionDb>(
    state: &DerivationState,
    block: &ParentChainBlock,
    db: &DB,
    da_readers: &[Arc<dyn DataAvailabilityReader>],
) -> ExtractorResult<ExtractedBlock> {
    if !state.is_parent_of(&block.header) {
        return Err(ExtractorError::ParentChainReorgDetected {
            number: block.header.number,
            expected: state.parent_chain_block_hash,
            got: block.header.parent_hash,
        });
    }

    let mut post = state.clone();
    post.advance_to(&block.header);

    let mut delayed_messages = Vec::new();
    for event in &block.events {
        if event.address != state.delayed_message_posting_target_address {
            continue
        }
        let ParentChainEventKind::DelayedMessageAdded(delayed) = &event.kind else { continue };

        if delayed.seq_num != post.next_delayed_message_seq_num {
            return Err(MalformedMessageError::DelayedSequenceMismatch {
                expected: post.next_delayed_message_seq_num,
                got: delayed.seq_num,
            }
            .into());
        }
        if delayed.before_inbox_acc != post.delayed_messages_seen_accumulator {
            return Err(MalformedMessageError::DelayedAccumulatorMismatch {
                seq_num: delayed.seq_num,
                expected: post.delayed_messages_seen_accumulator,
                got: delayed.before_inbox_acc,
            }
            .into());
        }

        post.delayed_messages_seen_accumulator = delayed.after_inbox_acc();
        post.next_delayed_message_seq_num += 1;
        delayed_messages.push(delayed.clone());
    }

    let lookup =
        DelayedMessageLookup::new(db, state.next_delayed_message_seq_num, &delayed_messages);
    let mut messages = Vec::new();
    for event in &block.events {
        if event.address != state.batch_posting_target_address {
            continue
        }
        let ParentChainEventKind::BatchPosted(batch) = &event.kind else { continue };

        if batch.seq_num != post.next_batch_seq_num {
            return Err(MalformedMessageError::BatchSequenceMismatch {
                expected: post.next_batch_seq_num,
                got: batch.seq_num,
            }
            .into());
        }

        let sequencer_message =
            resolve_batch(batch, post.next_delayed_message_seq_num, da_readers).await?;
        let out = messages_from_batch(&sequencer_message, post.delayed_messages_read, &lookup)
            .await?;
        tracing::trace!(target: "rollup::extractor", seq_num = batch.seq_num, messages = out.messages.len(), "extracted batch");

        for message in out.messages {
            post.accumulate_message(&message);
            messages.push(message);
        }
        post.delayed_messages_read = out.delayed_messages_read;
        post.next_batch_seq_num += 1;
    }

    Ok(ExtractedBlock { header: block.header.clone(), state: post, messages, delayed_messages })
}

/// Walks the parent chain from the block after `state` up to `target`, committing every folded
/// block to the database. Returns the state at `target` and the messages extracted on the way.
///
/// Each block is committed atomically along with its messages. Dropping the returned future
/// leaves the database at the last committed block.
pub async fn walk_forwards<R, DB>(
    state: &DerivationState,
    reader: &R,
    db: &DB,
    da_readers: &[Arc<dyn DataAvailabilityReader>],
    target: u64,
) -> ExtractorResult<(DerivationState, Vec<MessageWithMetadata>)>
where
    R: ParentChainReader,
    DB: MessageExtractionDb,
{
    let mut state = state.clone();
    let mut messages = Vec::new();

    while state.parent_chain_block_number < target {
        let number = state.parent_chain_block_number + 1;
        let block =
            reader.block_by_number(number).await?.ok_or(ExtractorError::MissingBlock(number))?;

        let extracted = extract_messages(&state, &block, db, da_readers).await?;
        db.save_state(&extracted.state, &extracted.messages, &extracted.delayed_messages).await?;

        messages.extend(extracted.messages);
        state = extracted.state;
    }

    Ok((state, messages))
}
