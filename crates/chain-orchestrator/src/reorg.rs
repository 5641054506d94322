//! Resolution of parent chain reorgs and message divergences.

use crate::{metrics::ReorgMetrics, ReorgError};
use rollup_db::{MessageExtractionDb, MessageStore};
use rollup_engine::{DefaultStateTransition, ExecutionEngine, StateTransition};
use rollup_extractor::{ParentChainReader, ReorgTrigger};
use rollup_primitives::{DerivationState, MessageIndex};
use std::sync::Arc;

/// Brings the message store, the execution engine and the extraction database back to a common
/// checkpoint after a reorg.
///
/// Every step of [`ReorgCoordinator::reorg_to_checkpoint`] is a no-op once applied, so an
/// interrupted resolution converges when it is run again.
#[derive(Debug)]
pub struct ReorgCoordinator<R, DB, S = DefaultStateTransition> {
    reader: R,
    db: DB,
    store: Arc<MessageStore>,
    engine: Arc<ExecutionEngine<S>>,
    reorg_detection_depth: u64,
    metrics: ReorgMetrics,
}

impl<R, DB, S> ReorgCoordinator<R, DB, S>
where
    R: ParentChainReader,
    DB: MessageExtractionDb,
    S: StateTransition,
{
    /// Returns a new [`ReorgCoordinator`].
    pub fn new(
        reader: R,
        db: DB,
        engine: Arc<ExecutionEngine<S>>,
        reorg_detection_depth: u64,
    ) -> Self {
        Self {
            reader,
            db,
            store: engine.store().clone(),
            engine,
            reorg_detection_depth,
            metrics: ReorgMetrics::default(),
        }
    }

    /// Returns the execution engine.
    pub const fn engine(&self) -> &Arc<ExecutionEngine<S>> {
        &self.engine
    }

    /// Resolves the reorg trigger, returning the checkpoint extraction resumes from.
    pub async fn resolve(&self, trigger: &ReorgTrigger) -> Result<DerivationState, ReorgError> {
        match trigger {
            ReorgTrigger::ParentChain(state) => self.handle_parent_chain_reorg(state).await,
            ReorgTrigger::Divergence(index) => self.handle_divergence(*index).await,
        }
    }

    /// Resolves a reorg of the parent chain below the state, walking back to the last stored
    /// state whose block is still canonical.
    #[tracing::instrument(skip_all, fields(block = state.parent_chain_block_number))]
    pub async fn handle_parent_chain_reorg(
        &self,
        state: &DerivationState,
    ) -> Result<DerivationState, ReorgError> {
        let from = state.parent_chain_block_number;
        let lowest = from.saturating_sub(self.reorg_detection_depth);

        for number in (lowest..=from).rev() {
            let Some(stored) = self.db.state_at_block_number(number).await? else { break };
            let canonical = self.reader.header_by_number(number).await?;
            if canonical.is_some_and(|header| header.hash == stored.parent_chain_block_hash) {
                tracing::info!(target: "rollup::orchestrator", common = number, depth = from - number, "found common ancestor");
                return self.reorg_to_checkpoint(stored).await;
            }
        }

        tracing::error!(target: "rollup::orchestrator", from, depth = self.reorg_detection_depth, "no common ancestor within reorg detection depth");
        Err(ReorgError::ReorgTooDeep { from, depth: self.reorg_detection_depth })
    }

    /// Resolves a divergence between the extracted and the stored message at the index, resuming
    /// from the last stored state that precedes it.
    #[tracing::instrument(skip_all, fields(index = index))]
    pub async fn handle_divergence(
        &self,
        index: MessageIndex,
    ) -> Result<DerivationState, ReorgError> {
        let checkpoint = self
            .db
            .latest_state_with_message_count_at_most(index)
            .await?
            .ok_or(ReorgError::MissingCheckpoint(index))?;
        tracing::warn!(target: "rollup::orchestrator", index, block = checkpoint.parent_chain_block_number, "stored message diverged from the parent chain");
        self.reorg_to_checkpoint(checkpoint).await
    }

    /// Truncates the message store, rolls the engine back and rewinds the extraction database to
    /// the checkpoint.
    pub async fn reorg_to_checkpoint(
        &self,
        checkpoint: DerivationState,
    ) -> Result<DerivationState, ReorgError> {
        let count = checkpoint.msg_count;
        {
            let mut store = self.store.lock();
            let finalized = store.finalized_count();
            if count < finalized {
                tracing::error!(target: "rollup::orchestrator", count, finalized, "reorg below the finalized message count");
                return Err(ReorgError::ReorgBelowFinalized { count, finalized });
            }

            let head = store.count();
            if count < head {
                store.reorg_to(count)?;
                self.metrics.reorgs.increment(1);
                self.metrics.reorg_depth.record((head - count) as f64);
                tracing::info!(target: "rollup::orchestrator", count, dropped = head - count, "truncated message store");
            }
            self.engine.rollback_to(&store, count);
        }

        self.db.rewind_to(&checkpoint).await?;
        Ok(checkpoint)
    }

    /// Rolls execution back so that only the messages `[0, count)` remain executed, dropping the
    /// finality tiers above. The message store is left untouched and the dropped messages are
    /// executed again.
    pub fn force_rollback(&self, count: u64) {
        tracing::warn!(target: "rollup::orchestrator", count, finalized = self.store.finalized_count(), "forcing execution rollback");
        self.metrics.forced_rollbacks.increment(1);
        let store = self.store.lock();
        self.engine.rollback_to(&store, count);
    }
}
