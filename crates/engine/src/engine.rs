use crate::{
    finality::{FinalityMarks, FinalityUpdate},
    metrics::EngineMetrics,
    BlockEnv, DefaultStateTransition, EngineConfig, EngineError, EngineResult, ExecutionState,
    FinalityTier, L2Block, StateTransition,
};
use alloy_primitives::{keccak256, Address, B256, U256};
use parking_lot::{Mutex, RwLock};
use rollup_db::{AncientStore, AncientTable, MessageStore, MessageStoreGuard};
use rollup_primitives::{
    BlockInfo, ConsensusFinality, FatalError, FatalErrorSender, FinalityData, MessageIndex,
    MessageResult,
};
use rollup_retryables::{RetryableError, RetryableTicket};
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::Arc,
    time::Instant,
};
use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
    time::Duration,
};
use tokio_util::sync::CancellationToken;

mod freezer;

/// The delay before retrying a message discarded because of a concurrent reorg.
const STALE_MESSAGE_BACKOFF: Duration = Duration::from_millis(10);

/// The outcome of [`ExecutionEngine::execute_next_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The next message was applied, producing the block.
    Executed(BlockInfo),
    /// The store holds no message past the head.
    NoMessage,
    /// The message was read before a reorg and was discarded.
    Stale,
}

/// The executed chain.
///
/// Blocks moved into the ancient store are dropped from memory. Post states are kept for the
/// blocks held in memory, for the last frozen block and for every snapshot below it.
#[derive(Debug)]
struct Chain {
    /// The index of the first block held in memory.
    first: MessageIndex,
    blocks: VecDeque<L2Block>,
    /// The post states, keyed by message index.
    states: BTreeMap<MessageIndex, ExecutionState>,
    by_hash: HashMap<B256, MessageIndex>,
    genesis: ExecutionState,
    /// The reorg generation of the message store the chain follows.
    store_generation: u64,
}

impl Chain {
    fn count(&self) -> u64 {
        self.first + self.blocks.len() as u64
    }

    /// Returns the block held in memory for the message.
    fn block(&self, index: MessageIndex) -> Option<&L2Block> {
        let offset = index.checked_sub(self.first)?;
        self.blocks.get(offset as usize)
    }

    fn head_state(&self) -> &ExecutionState {
        self.states.last_key_value().map_or(&self.genesis, |(_, state)| state)
    }

    fn push(&mut self, block: L2Block, state: ExecutionState) {
        let index = block.message_index();
        self.by_hash.insert(block.hash, index);
        self.blocks.push_back(block);
        self.states.insert(index, state);
    }

    /// Drops every block and state from message `count` on, frozen blocks included.
    fn truncate(&mut self, count: u64) {
        if count < self.first {
            self.blocks.clear();
            self.by_hash.retain(|_, index| *index < count);
            self.first = count;
        } else {
            for block in self.blocks.drain((count - self.first) as usize..) {
                self.by_hash.remove(&block.hash);
            }
        }
        self.states.split_off(&count);
    }

    /// Drops the blocks below `frozen` from memory. Their states are dropped too, except for the
    /// snapshots and the state of the last frozen block.
    fn prune(&mut self, frozen: MessageIndex, snapshot_interval: u64) {
        let frozen = frozen.min(self.count());
        if frozen <= self.first {
            return;
        }
        self.blocks.drain(..(frozen - self.first) as usize);
        self.first = frozen;

        let retained = self.states.split_off(&(frozen - 1));
        let pruned = std::mem::replace(&mut self.states, retained);
        self.states.extend(
            pruned.into_iter().filter(|(index, _)| (index + 1) % snapshot_interval.max(1) == 0),
        );
    }
}

/// The execution engine applies the messages of the [`MessageStore`] in order, one block per
/// message, and tracks the finality tiers of the produced chain.
///
/// Locks are always taken in the order: message store, chain, finality marks, ancient store.
#[derive(Debug)]
pub struct ExecutionEngine<S = DefaultStateTransition> {
    config: EngineConfig,
    stf: S,
    store: Arc<MessageStore>,
    ancients: AncientStore,
    /// The parent hash of the first block.
    genesis_parent_hash: B256,
    chain: RwLock<Chain>,
    finality: Mutex<FinalityMarks>,
    finalized_block: watch::Sender<Option<u64>>,
    /// Wakes the consumer task after a rollback.
    rolled_back: Notify,
    metrics: EngineMetrics,
}

impl ExecutionEngine {
    /// Returns a new [`ExecutionEngine`] using the [`DefaultStateTransition`].
    pub fn new(config: EngineConfig, store: Arc<MessageStore>) -> Self {
        let stf = DefaultStateTransition::new(&config);
        Self::with_state_transition(config, stf, store)
    }
}

impl<S: StateTransition> ExecutionEngine<S> {
    /// Returns a new [`ExecutionEngine`] applying messages with the state transition.
    pub fn with_state_transition(config: EngineConfig, stf: S, store: Arc<MessageStore>) -> Self {
        let mut preimage = config.chain_id.to_be_bytes().to_vec();
        preimage.extend_from_slice(&config.genesis_timestamp.to_be_bytes());
        let chain = Chain {
            first: 0,
            blocks: VecDeque::new(),
            states: BTreeMap::new(),
            by_hash: HashMap::new(),
            genesis: ExecutionState::new(config.retryables),
            store_generation: store.reorg_generation(),
        };
        let (finalized_block, _) = watch::channel(None);

        Self {
            ancients: AncientStore::starting_at(config.genesis_block_number),
            genesis_parent_hash: keccak256(preimage),
            chain: RwLock::new(chain),
            finality: Mutex::new(FinalityMarks::default()),
            finalized_block,
            rolled_back: Notify::new(),
            metrics: EngineMetrics::default(),
            config,
            stf,
            store,
        }
    }

    /// Returns the engine configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the message store the engine reads from.
    pub const fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    /// Returns the ancient store holding the frozen blocks.
    pub const fn ancients(&self) -> &AncientStore {
        &self.ancients
    }

    /// Applies the message following the head, if the store holds it.
    ///
    /// The message is applied without holding the chain write lock. If a reorg or another
    /// execution moved the chain in the meantime, the block is discarded and
    /// [`ExecutionOutcome::Stale`] is returned.
    pub fn execute_next_message(&self) -> EngineResult<ExecutionOutcome> {
        let index = self.chain.read().count();
        let Some((message, generation)) = self.store.message_with_generation(index) else {
            return Ok(ExecutionOutcome::NoMessage);
        };

        let start = Instant::now();
        let (state, block) = {
            let chain = self.chain.read();
            if chain.count() != index || chain.store_generation != generation {
                return Ok(self.stale(index));
            }
            let env = self.block_env(&chain, index);
            self.stf.apply_message(chain.head_state(), &env, &message)
        };

        let info = block.block_info();
        {
            let mut chain = self.chain.write();
            if chain.count() != index || chain.store_generation != generation {
                return Ok(self.stale(index));
            }
            chain.push(block, state);
        }

        self.metrics.messages_executed.increment(1);
        self.metrics.message_execution_duration.record(start.elapsed().as_secs_f64());
        self.metrics.head_block.set(info.number as f64);
        tracing::trace!(target: "rollup::engine", index, block = %info, "executed message");

        self.store.record_result(index, generation, MessageResult { block_hash: info.hash })?;
        Ok(ExecutionOutcome::Executed(info))
    }

    fn stale(&self, index: MessageIndex) -> ExecutionOutcome {
        tracing::debug!(target: "rollup::engine", index, "discarding message read before a reorg");
        self.metrics.stale_messages.increment(1);
        ExecutionOutcome::Stale
    }

    fn block_env(&self, chain: &Chain, index: MessageIndex) -> BlockEnv {
        let parent = index.checked_sub(1).and_then(|parent| match chain.block(parent) {
            Some(block) => Some((block.hash, block.header.timestamp)),
            None => self.block_at(chain, parent).map(|block| (block.hash, block.header.timestamp)),
        });
        let (parent_hash, parent_timestamp) =
            parent.unwrap_or((self.genesis_parent_hash, self.config.genesis_timestamp));
        BlockEnv {
            parent_hash,
            parent_timestamp,
            number: self.message_index_to_block_number(index),
            message_index: index,
        }
    }

    /// Returns the block of the message, read back from the ancient store once frozen.
    fn block_at(&self, chain: &Chain, index: MessageIndex) -> Option<L2Block> {
        if let Some(block) = chain.block(index) {
            return Some(block.clone());
        }
        if index >= chain.first {
            return None;
        }
        let number = self.message_index_to_block_number(index);
        match L2Block::from_ancient(&self.ancients.block(number)?) {
            Ok(block) => Some(block),
            Err(err) => {
                tracing::error!(target: "rollup::engine", number, %err, "failed to decode frozen block");
                None
            }
        }
    }

    fn block_hash_at(&self, chain: &Chain, index: MessageIndex) -> Option<B256> {
        if let Some(block) = chain.block(index) {
            return Some(block.hash);
        }
        if index >= chain.first {
            return None;
        }
        let number = self.message_index_to_block_number(index);
        let hash = self.ancients.ancient(AncientTable::Hashes, number)?;
        B256::try_from(hash.as_ref()).ok()
    }

    /// Sets the finality tiers from the consensus side view.
    ///
    /// Every supplied tier must point at the block executed for its message index. A `None` tier
    /// is cleared. On error no tier is modified.
    #[tracing::instrument(skip_all, fields(safe = ?finality.safe.map(|f| f.msg_idx), finalized = ?finality.finalized.map(|f| f.msg_idx)))]
    pub fn set_finality_data(&self, finality: &ConsensusFinality) -> EngineResult<()> {
        let mut store = self.store.lock();
        let chain = self.chain.read();

        let update = FinalityUpdate::validate(finality, &self.config, |index| {
            self.block_hash_at(&chain, index)
        });
        let update = match update {
            Ok(update) => update,
            Err(err) => {
                if matches!(err, EngineError::FinalityBlockHashMismatch { .. }) {
                    self.metrics.finality_mismatches.increment(1);
                }
                return Err(err);
            }
        };

        self.apply_finality(&mut store, &update);
        Ok(())
    }

    /// Forces the finalized tier to the block number, bypassing block validation gating.
    pub fn set_finalized(&self, block_number: u64) -> EngineResult<()> {
        let mut store = self.store.lock();
        let chain = self.chain.read();

        let index = self.block_number_to_message_index(block_number)?;
        let hash =
            self.block_hash_at(&chain, index).ok_or(EngineError::BlockNotFound(block_number))?;
        tracing::info!(target: "rollup::engine", block = %BlockInfo::new(block_number, hash), "forcing finalized block");

        let update = FinalityUpdate::finalized(FinalityData::new(index, hash));
        self.apply_finality(&mut store, &update);
        Ok(())
    }

    fn apply_finality(&self, store: &mut MessageStoreGuard<'_>, update: &FinalityUpdate) {
        let mut marks = self.finality.lock();
        if !marks.apply(update) {
            return;
        }
        self.metrics.finality_updates.increment(1);

        let finalized = marks.finalized.map(|data| self.message_index_to_block_number(data.msg_idx));
        if let Some(data) = marks.finalized {
            store.set_finalized_count(data.msg_idx + 1);
        }
        drop(marks);
        self.publish_finalized(finalized);
    }

    fn publish_finalized(&self, finalized: Option<u64>) {
        if let Some(number) = finalized {
            self.metrics.finalized_block.set(number as f64);
        }
        self.finalized_block.send_if_modified(|current| {
            let modified = *current != finalized;
            *current = finalized;
            modified
        });
    }

    /// Rolls the head back so that only the messages `[0, count)` remain executed.
    ///
    /// The caller holds the store lock, and the engine adopts the store's reorg generation so
    /// messages read before the reorg are discarded. Finality tiers and frozen blocks above the
    /// new head are dropped. A count at or above the head leaves the chain untouched. Rolling
    /// back below the retained states re-executes the messages following the closest snapshot.
    pub fn rollback_to(&self, store: &MessageStoreGuard<'_>, count: u64) {
        let mut chain = self.chain.write();
        chain.store_generation = store.reorg_generation();

        let head = chain.count();
        let mut count = count;
        if count < head {
            tracing::info!(target: "rollup::engine", count, dropped = head - count, "rolling back execution head");
            let restore = count > 0 && !chain.states.contains_key(&(count - 1));
            chain.truncate(count);
            if restore {
                count = self.restore_state(&mut chain, store, count);
            }
            self.metrics.rollbacks.increment(1);
            self.metrics.head_block.set(self.message_index_to_block_number(count) as f64 - 1.0);
        }

        let mut marks = self.finality.lock();
        marks.truncate(count);
        let finalized = marks.finalized.map(|data| self.message_index_to_block_number(data.msg_idx));

        let first_dropped = self.message_index_to_block_number(count);
        if self.ancients.ancients() > first_dropped {
            tracing::warn!(target: "rollup::engine", block = first_dropped, "truncating frozen blocks");
            self.ancients.truncate_head(first_dropped);
        }
        drop(marks);
        drop(chain);

        self.publish_finalized(finalized);
        self.rolled_back.notify_one();
    }

    /// Rebuilds the post state of message `count - 1` by applying the messages following the
    /// closest retained state. Returns the count of executed messages once restored, lower than
    /// `count` only if the store no longer holds a message to apply.
    fn restore_state(&self, chain: &mut Chain, store: &MessageStoreGuard<'_>, count: u64) -> u64 {
        let (start, mut state) = match chain.states.range(..count).next_back() {
            Some((index, state)) => (index + 1, state.clone()),
            None => (0, chain.genesis.clone()),
        };
        tracing::debug!(target: "rollup::engine", from = start, to = count, "restoring execution state");

        for index in start..count {
            let Some(message) = store.message(index) else {
                tracing::error!(target: "rollup::engine", index, "missing message to restore execution state");
                chain.truncate(start);
                return start;
            };
            let env = self.block_env(chain, index);
            state = self.stf.apply_message(&state, &env, message).0;
        }
        chain.states.insert(count - 1, state);
        count
    }

    /// Returns the block number produced by the message.
    pub const fn message_index_to_block_number(&self, index: MessageIndex) -> u64 {
        self.config.genesis_block_number + index
    }

    /// Returns the index of the message producing the block number.
    pub const fn block_number_to_message_index(&self, number: u64) -> EngineResult<MessageIndex> {
        match number.checked_sub(self.config.genesis_block_number) {
            Some(index) => Ok(index),
            None => Err(EngineError::BlockNotFound(number)),
        }
    }

    /// Returns the count of executed messages.
    pub fn executed_count(&self) -> u64 {
        self.chain.read().count()
    }

    /// Returns the head block, if any message was executed.
    pub fn head_block(&self) -> Option<BlockInfo> {
        let chain = self.chain.read();
        let index = chain.count().checked_sub(1)?;
        let hash = self.block_hash_at(&chain, index)?;
        Some(BlockInfo::new(self.message_index_to_block_number(index), hash))
    }

    /// Returns the block with the number.
    pub fn block_by_number(&self, number: u64) -> Option<L2Block> {
        let index = self.block_number_to_message_index(number).ok()?;
        self.block_at(&self.chain.read(), index)
    }

    /// Returns the block with the hash.
    pub fn block_by_hash(&self, hash: B256) -> Option<L2Block> {
        let chain = self.chain.read();
        chain.by_hash.get(&hash).and_then(|index| self.block_at(&chain, *index))
    }

    /// Returns the result of the execution of the message.
    pub fn result_at_message_index(&self, index: MessageIndex) -> EngineResult<MessageResult> {
        self.block_hash_at(&self.chain.read(), index)
            .map(|block_hash| MessageResult { block_hash })
            .ok_or(EngineError::MessageNotExecuted(index))
    }

    /// Returns the finality data of the tier.
    pub fn finality(&self, tier: FinalityTier) -> Option<FinalityData> {
        self.finality.lock().get(tier)
    }

    fn tier_block(&self, tier: FinalityTier) -> Option<BlockInfo> {
        self.finality(tier).map(|data| {
            BlockInfo::new(self.message_index_to_block_number(data.msg_idx), data.block_hash)
        })
    }

    /// Returns the finalized block.
    pub fn finalized_block(&self) -> EngineResult<BlockInfo> {
        self.tier_block(FinalityTier::Finalized).ok_or(EngineError::FinalizedBlockNotFound)
    }

    /// Returns the safe block.
    pub fn safe_block(&self) -> EngineResult<BlockInfo> {
        self.tier_block(FinalityTier::Safe).ok_or(EngineError::SafeBlockNotFound)
    }

    /// Returns the validated block, if block validation reported one.
    pub fn validated_block(&self) -> Option<BlockInfo> {
        self.tier_block(FinalityTier::Validated)
    }

    /// Returns a receiver for the finalized block number.
    pub fn subscribe_finalized(&self) -> watch::Receiver<Option<u64>> {
        self.finalized_block.subscribe()
    }

    /// Returns the retryable ticket with the id at the head of the chain.
    pub fn ticket(&self, id: B256) -> Result<RetryableTicket, RetryableError> {
        self.chain.read().head_state().retryables().ticket(id).cloned()
    }

    /// Returns the balance of the address at the head of the chain.
    pub fn balance(&self, address: Address) -> U256 {
        self.chain.read().head_state().balance(address)
    }
}

impl<S: StateTransition + 'static> ExecutionEngine<S> {
    /// Spawns the task executing messages as soon as the store holds them.
    ///
    /// The task stops on cancellation or after reporting a fatal error.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken, fatal: FatalErrorSender) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel, fatal).await })
    }

    async fn run(&self, cancel: CancellationToken, fatal: FatalErrorSender) {
        let mut count = self.store.subscribe();
        tracing::info!(target: "rollup::engine", executed = self.executed_count(), "starting message execution");

        while !cancel.is_cancelled() {
            match self.execute_next_message() {
                Ok(ExecutionOutcome::Executed(_)) => tokio::task::yield_now().await,
                Ok(ExecutionOutcome::NoMessage) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = self.rolled_back.notified() => {}
                        res = count.changed() => if res.is_err() { break },
                    }
                }
                Ok(ExecutionOutcome::Stale) => backoff(&cancel).await,
                Err(err) if err.is_fatal() => {
                    fatal.report(FatalError::new("engine", &err));
                    break;
                }
                Err(err) => {
                    tracing::warn!(target: "rollup::engine", %err, "failed to execute message");
                    backoff(&cancel).await;
                }
            }
        }

        tracing::info!(target: "rollup::engine", "message execution stopped");
    }
}

async fn backoff(cancel: &CancellationToken) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(STALE_MESSAGE_BACKOFF) => {}
    }
}
