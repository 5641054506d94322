//! The ordered log of canonical messages.

use crate::{metrics::MessageStoreMetrics, MessageStoreError};
use parking_lot::{Mutex, MutexGuard};
use rollup_primitives::{BlockInfo, MessageIndex, MessageResult, MessageWithMetadata};
use std::ops::Range;
use tokio::sync::watch;

/// A message held by the [`MessageStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// The message.
    pub message: MessageWithMetadata,
    /// The parent chain block the message was extracted from, once known.
    pub origin: Option<BlockInfo>,
    /// The result of the execution of the message, once known.
    pub result: Option<MessageResult>,
}

impl StoredMessage {
    const fn new(message: MessageWithMetadata, origin: Option<BlockInfo>) -> Self {
        Self { message, origin, result: None }
    }
}

/// An append-only log of canonical messages, truncated only by reorgs.
///
/// Every mutation goes through the store mutex. Components that also need the execution engine
/// locks must take the store lock first, see [`MessageStore::lock`].
#[derive(Debug)]
pub struct MessageStore {
    inner: Mutex<MessageStoreInner>,
    count: watch::Sender<u64>,
    metrics: MessageStoreMetrics,
}

#[derive(Debug, Default)]
struct MessageStoreInner {
    entries: Vec<StoredMessage>,
    finalized_count: u64,
    reorg_generation: u64,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    /// Returns a new empty [`MessageStore`].
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            inner: Mutex::new(MessageStoreInner::default()),
            count,
            metrics: MessageStoreMetrics::default(),
        }
    }

    /// Locks the store, returning a guard that can perform writes.
    pub fn lock(&self) -> MessageStoreGuard<'_> {
        MessageStoreGuard { inner: self.inner.lock(), store: self }
    }

    /// Appends the message at `index`, which must be the next index of the store.
    pub fn append(
        &self,
        index: MessageIndex,
        message: MessageWithMetadata,
    ) -> Result<MessageIndex, MessageStoreError> {
        self.lock().append(index, message, None)
    }

    /// Pushes a range of extracted messages starting at `first_index`.
    ///
    /// Messages already present at their index are kept and tagged with the origin block. A
    /// different message at an index returns [`MessageStoreError::Diverged`] without modifying the
    /// store.
    pub fn push_messages(
        &self,
        first_index: MessageIndex,
        messages: &[MessageWithMetadata],
        origin: BlockInfo,
    ) -> Result<(), MessageStoreError> {
        let mut guard = self.lock();
        let count = guard.count();
        if first_index > count {
            return Err(MessageStoreError::SequenceMismatch { expected: count, got: first_index });
        }

        // check for divergence before applying anything.
        for (offset, message) in messages.iter().enumerate() {
            let index = first_index + offset as u64;
            if let Some(stored) = guard.inner.entries.get(index as usize) {
                if &stored.message != message {
                    tracing::warn!(target: "rollup::db", index, "extracted message diverged from stored message");
                    return Err(MessageStoreError::Diverged { index });
                }
            }
        }

        for (offset, message) in messages.iter().enumerate() {
            let index = first_index + offset as u64;
            match guard.inner.entries.get_mut(index as usize) {
                Some(stored) => stored.origin = Some(origin),
                None => {
                    guard.append(index, message.clone(), Some(origin))?;
                }
            }
        }

        Ok(())
    }

    /// Truncates the store to `[0, count)`.
    pub fn reorg_to(&self, count: u64) -> Result<(), MessageStoreError> {
        self.lock().reorg_to(count)
    }

    /// Returns the count of messages in the store.
    pub fn count(&self) -> u64 {
        self.inner.lock().entries.len() as u64
    }

    /// Returns a receiver for the message count.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.count.subscribe()
    }

    /// Returns the stored message at the index.
    pub fn get(&self, index: MessageIndex) -> Option<StoredMessage> {
        self.inner.lock().entries.get(index as usize).cloned()
    }

    /// Returns the message at the index along with the reorg generation it was read at.
    pub fn message_with_generation(
        &self,
        index: MessageIndex,
    ) -> Option<(MessageWithMetadata, u64)> {
        let inner = self.inner.lock();
        inner.entries.get(index as usize).map(|e| (e.message.clone(), inner.reorg_generation))
    }

    /// Returns the messages in the range, stopping at the head of the store.
    pub fn messages(&self, range: Range<MessageIndex>) -> Vec<MessageWithMetadata> {
        let inner = self.inner.lock();
        let end = (range.end as usize).min(inner.entries.len());
        let start = (range.start as usize).min(end);
        inner.entries[start..end].iter().map(|e| e.message.clone()).collect()
    }

    /// Returns the count of reorgs applied to the store.
    pub fn reorg_generation(&self) -> u64 {
        self.inner.lock().reorg_generation
    }

    /// Records the result of the execution of the message at the index, read at the reorg
    /// generation. Results of messages read before a reorg are discarded.
    pub fn record_result(
        &self,
        index: MessageIndex,
        generation: u64,
        result: MessageResult,
    ) -> Result<(), MessageStoreError> {
        let mut inner = self.inner.lock();
        if inner.reorg_generation != generation {
            tracing::debug!(target: "rollup::db", index, generation, current = inner.reorg_generation, "discarding result of stale message");
            return Ok(());
        }
        let entry =
            inner.entries.get_mut(index as usize).ok_or(MessageStoreError::MessageNotFound(index))?;
        entry.result = Some(result);
        Ok(())
    }

    /// Returns the result of the execution of the message at the index.
    pub fn result(&self, index: MessageIndex) -> Option<MessageResult> {
        self.inner.lock().entries.get(index as usize).and_then(|e| e.result)
    }

    /// Returns the highest message index extracted from a parent chain block at or below
    /// `block_number`.
    pub fn last_index_with_origin_at_or_below(&self, block_number: u64) -> Option<MessageIndex> {
        let inner = self.inner.lock();
        inner
            .entries
            .iter()
            .rposition(|e| e.origin.is_some_and(|origin| origin.number <= block_number))
            .map(|i| i as u64)
    }

    /// Returns the finalized message count.
    pub fn finalized_count(&self) -> u64 {
        self.inner.lock().finalized_count
    }

    /// Moves the finalized watermark up to `count`. The watermark never decreases.
    pub fn set_finalized_count(&self, count: u64) {
        self.lock().set_finalized_count(count)
    }
}

/// A lock over the [`MessageStore`].
#[derive(Debug)]
pub struct MessageStoreGuard<'a> {
    inner: MutexGuard<'a, MessageStoreInner>,
    store: &'a MessageStore,
}

impl MessageStoreGuard<'_> {
    /// Returns the count of messages in the store.
    pub fn count(&self) -> u64 {
        self.inner.entries.len() as u64
    }

    /// Returns the finalized message count.
    pub fn finalized_count(&self) -> u64 {
        self.inner.finalized_count
    }

    /// Returns the count of reorgs applied to the store.
    pub fn reorg_generation(&self) -> u64 {
        self.inner.reorg_generation
    }

    /// Moves the finalized watermark up to `count`, capped at the head of the store.
    pub fn set_finalized_count(&mut self, count: u64) {
        let count = count.min(self.count());
        if count > self.inner.finalized_count {
            tracing::trace!(target: "rollup::db", count, "advancing finalized message count");
            self.inner.finalized_count = count;
        }
    }

    /// Returns the message at the index.
    pub fn message(&self, index: MessageIndex) -> Option<&MessageWithMetadata> {
        self.inner.entries.get(index as usize).map(|e| &e.message)
    }

    /// Returns the count of delayed messages read once the head message is applied.
    pub fn delayed_messages_read(&self) -> u64 {
        self.inner.entries.last().map_or(0, |e| e.message.delayed_messages_read)
    }

    /// Appends the message at the head of the store, returning its index.
    pub fn push(&mut self, message: MessageWithMetadata) -> Result<MessageIndex, MessageStoreError> {
        let index = self.count();
        self.append(index, message, None)
    }

    fn append(
        &mut self,
        index: MessageIndex,
        message: MessageWithMetadata,
        origin: Option<BlockInfo>,
    ) -> Result<MessageIndex, MessageStoreError> {
        let expected = self.count();
        if index != expected {
            return Err(MessageStoreError::SequenceMismatch { expected, got: index });
        }

        self.inner.entries.push(StoredMessage::new(message, origin));
        self.store.metrics.appended_messages.increment(1);
        self.store.count.send_replace(index + 1);

        Ok(index)
    }

    /// Truncates the store to `[0, count)`.
    pub fn reorg_to(&mut self, count: u64) -> Result<(), MessageStoreError> {
        let head = self.count();
        if count > head {
            return Err(MessageStoreError::ReorgAboveHead { count, head });
        }
        if count < self.inner.finalized_count {
            return Err(MessageStoreError::ReorgBelowFinalized {
                count,
                finalized: self.inner.finalized_count,
            });
        }
        if count == head {
            return Ok(());
        }

        tracing::info!(target: "rollup::db", count, dropped = head - count, "truncating message store");
        self.inner.entries.truncate(count as usize);
        self.inner.reorg_generation += 1;
        self.store.metrics.reorgs.increment(1);
        self.store.metrics.truncated_messages.increment(head - count);
        self.store.count.send_replace(count);

        Ok(())
    }
}
