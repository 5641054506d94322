//! Persistence of the message extraction progress.

use crate::DatabaseError;
use alloy_primitives::B256;
use parking_lot::RwLock;
use rollup_primitives::{DelayedInboxMessage, DerivationState, MessageIndex, MessageWithMetadata};
use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    ops::Range,
};

/// Persists [`DerivationState`]s along with the messages extracted to reach them.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait MessageExtractionDb: Debug + Send + Sync {
    /// Saves the state with the messages and delayed messages extracted from its parent chain
    /// block. The write is atomic: on error nothing is persisted.
    async fn save_state(
        &self,
        state: &DerivationState,
        messages: &[MessageWithMetadata],
        delayed_messages: &[DelayedInboxMessage],
    ) -> Result<(), DatabaseError>;

    /// Returns the state reached after folding the parent chain block with the hash.
    async fn get_state(
        &self,
        parent_chain_block_hash: B256,
    ) -> Result<Option<DerivationState>, DatabaseError>;

    /// Returns the state of the last folded parent chain block.
    async fn head_state(&self) -> Result<Option<DerivationState>, DatabaseError>;

    /// Returns the state that folded the parent chain block with the number.
    async fn state_at_block_number(
        &self,
        number: u64,
    ) -> Result<Option<DerivationState>, DatabaseError>;

    /// Returns the latest state whose message count is at most `count`.
    async fn latest_state_with_message_count_at_most(
        &self,
        count: u64,
    ) -> Result<Option<DerivationState>, DatabaseError>;

    /// Returns the delayed message with the sequence number.
    async fn delayed_message(
        &self,
        seq_num: u64,
    ) -> Result<Option<DelayedInboxMessage>, DatabaseError>;

    /// Returns the extracted messages in the range.
    async fn messages(
        &self,
        range: Range<MessageIndex>,
    ) -> Result<Vec<MessageWithMetadata>, DatabaseError>;

    /// Makes `state` the head state, dropping every state, message and delayed message past it.
    async fn rewind_to(&self, state: &DerivationState) -> Result<(), DatabaseError>;
}

/// An in-memory [`MessageExtractionDb`].
#[derive(Debug, Default)]
pub struct InMemoryExtractionDb {
    inner: RwLock<ExtractionDbInner>,
}

#[derive(Debug, Default)]
struct ExtractionDbInner {
    states: HashMap<B256, DerivationState>,
    canonical: BTreeMap<u64, B256>,
    messages: Vec<MessageWithMetadata>,
    delayed: Vec<DelayedInboxMessage>,
}

impl ExtractionDbInner {
    fn head(&self) -> Option<&DerivationState> {
        self.canonical.last_key_value().and_then(|(_, hash)| self.states.get(hash))
    }
}

impl InMemoryExtractionDb {
    /// Returns a new empty [`InMemoryExtractionDb`].
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MessageExtractionDb for InMemoryExtractionDb {
    async fn save_state(
        &self,
        state: &DerivationState,
        messages: &[MessageWithMetadata],
        delayed_messages: &[DelayedInboxMessage],
    ) -> Result<(), DatabaseError> {
        let mut inner = self.inner.write();

        // validate everything before writing.
        if let Some(head) = inner.head() {
            if head.parent_chain_block_number + 1 != state.parent_chain_block_number ||
                head.parent_chain_block_hash != state.parent_chain_prev_block_hash
            {
                return Err(DatabaseError::NonContiguousState {
                    head: head.parent_chain_block_number,
                    got: state.parent_chain_block_number,
                });
            }
        }
        let stored = inner.messages.len() as u64;
        if stored + messages.len() as u64 != state.msg_count {
            return Err(DatabaseError::NonContiguousMessages {
                count: messages.len(),
                msg_count: state.msg_count,
                stored,
            });
        }
        let mut expected = inner.delayed.len() as u64;
        for delayed in delayed_messages {
            if delayed.seq_num != expected {
                return Err(DatabaseError::NonContiguousDelayedMessages {
                    expected,
                    got: delayed.seq_num,
                });
            }
            expected += 1;
        }

        tracing::trace!(
            target: "rollup::db",
            block_number = state.parent_chain_block_number,
            messages = messages.len(),
            delayed_messages = delayed_messages.len(),
            "saving derivation state"
        );
        inner.messages.extend_from_slice(messages);
        inner.delayed.extend_from_slice(delayed_messages);
        inner.canonical.insert(state.parent_chain_block_number, state.parent_chain_block_hash);
        inner.states.insert(state.parent_chain_block_hash, state.clone());

        Ok(())
    }

    async fn get_state(
        &self,
        parent_chain_block_hash: B256,
    ) -> Result<Option<DerivationState>, DatabaseError> {
        Ok(self.inner.read().states.get(&parent_chain_block_hash).cloned())
    }

    async fn head_state(&self) -> Result<Option<DerivationState>, DatabaseError> {
        Ok(self.inner.read().head().cloned())
    }

    async fn state_at_block_number(
        &self,
        number: u64,
    ) -> Result<Option<DerivationState>, DatabaseError> {
        let inner = self.inner.read();
        Ok(inner.canonical.get(&number).and_then(|hash| inner.states.get(hash)).cloned())
    }

    async fn latest_state_with_message_count_at_most(
        &self,
        count: u64,
    ) -> Result<Option<DerivationState>, DatabaseError> {
        let inner = self.inner.read();
        Ok(inner
            .canonical
            .values()
            .rev()
            .filter_map(|hash| inner.states.get(hash))
            .find(|state| state.msg_count <= count)
            .cloned())
    }

    async fn delayed_message(
        &self,
        seq_num: u64,
    ) -> Result<Option<DelayedInboxMessage>, DatabaseError> {
        Ok(self.inner.read().delayed.get(seq_num as usize).cloned())
    }

    async fn messages(
        &self,
        range: Range<MessageIndex>,
    ) -> Result<Vec<MessageWithMetadata>, DatabaseError> {
        let inner = self.inner.read();
        let end = (range.end as usize).min(inner.messages.len());
        let start = (range.start as usize).min(end);
        Ok(inner.messages[start..end].to_vec())
    }

    async fn rewind_to(&self, state: &DerivationState) -> Result<(), DatabaseError> {
        let mut inner = self.inner.write();
        if !inner.states.contains_key(&state.parent_chain_block_hash) {
            return Err(DatabaseError::StateNotFound(state.parent_chain_block_hash));
        }

        let removed = inner.canonical.split_off(&(state.parent_chain_block_number + 1));
        for hash in removed.values() {
            inner.states.remove(hash);
        }
        inner.canonical.insert(state.parent_chain_block_number, state.parent_chain_block_hash);
        inner.messages.truncate(state.msg_count as usize);
        inner.delayed.truncate(state.next_delayed_message_seq_num as usize);

        tracing::debug!(
            target: "rollup::db",
            block_number = state.parent_chain_block_number,
            dropped_states = removed.len(),
            "rewound derivation state"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use rollup_primitives::{random, Message, ParentChainHeader};

    fn header(number: u64, parent: B256) -> ParentChainHeader {
        ParentChainHeader { number, hash: B256::random(), parent_hash: parent, ..Default::default() }
    }

    fn next_state(
        prev: &DerivationState,
        messages: &[MessageWithMetadata],
    ) -> (DerivationState, ParentChainHeader) {
        let header = header(prev.parent_chain_block_number + 1, prev.parent_chain_block_hash);
        let mut state = prev.clone();
        state.advance_to(&header);
        for msg in messages {
            state.accumulate_message(msg);
        }
        (state, header)
    }

    #[tokio::test]
    async fn test_should_save_and_rewind_states() -> eyre::Result<()> {
        // Given
        let db = InMemoryExtractionDb::new();
        let anchor = header(100, B256::random());
        let initial = DerivationState::initial(1, &anchor, Address::ZERO, Address::ZERO);
        db.save_state(&initial, &[], &[]).await?;

        let msgs: Vec<_> = (0..3).map(|_| MessageWithMetadata::new(random!(Message), 0)).collect();
        let (first, _) = next_state(&initial, &msgs[..2]);
        db.save_state(&first, &msgs[..2], &[]).await?;
        let (second, _) = next_state(&first, &msgs[2..]);
        db.save_state(&second, &msgs[2..], &[]).await?;

        // When
        db.rewind_to(&first).await?;

        // Then
        assert_eq!(db.head_state().await?, Some(first.clone()));
        assert_eq!(db.get_state(second.parent_chain_block_hash).await?, None);
        assert_eq!(db.messages(0..10).await?, msgs[..2].to_vec());
        assert_eq!(db.state_at_block_number(101).await?, Some(first.clone()));
        assert_eq!(db.latest_state_with_message_count_at_most(1).await?, Some(initial));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_reject_non_contiguous_state() -> eyre::Result<()> {
        // Given
        let db = InMemoryExtractionDb::new();
        let anchor = header(100, B256::random());
        let initial = DerivationState::initial(1, &anchor, Address::ZERO, Address::ZERO);
        db.save_state(&initial, &[], &[]).await?;

        // When
        let (mut orphan, _) = next_state(&initial, &[]);
        orphan.parent_chain_prev_block_hash = B256::random();
        let res = db.save_state(&orphan, &[], &[]).await;

        // Then
        assert_eq!(res, Err(DatabaseError::NonContiguousState { head: 100, got: 101 }));
        assert_eq!(db.head_state().await?, Some(initial));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_reject_message_count_mismatch() -> eyre::Result<()> {
        let db = InMemoryExtractionDb::new();
        let anchor = header(7, B256::random());
        let initial = DerivationState::initial(1, &anchor, Address::ZERO, Address::ZERO);
        db.save_state(&initial, &[], &[]).await?;

        let (state, _) = next_state(&initial, &[]);
        let msg = MessageWithMetadata::new(random!(Message), 0);
        let res = db.save_state(&state, &[msg], &[]).await;

        assert!(matches!(res, Err(DatabaseError::NonContiguousMessages { .. })));
        assert!(db.messages(0..1).await?.is_empty());

        Ok(())
    }
}
