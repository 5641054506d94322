//! Moves finalized blocks into the ancient store.

use crate::{EngineError, EngineResult, ExecutionEngine, L2Block, StateTransition};
use rollup_primitives::{FatalError, FatalErrorSender};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

impl<S: StateTransition> ExecutionEngine<S> {
    /// Freezes the next batch of finalized blocks, starting at [`rollup_db::AncientStore::ancients`].
    /// Returns the count of frozen blocks, zero once the ancient store caught up with the
    /// finalized block.
    ///
    /// Frozen blocks are dropped from memory and served from the ancient store afterwards.
    pub fn freeze_batch(&self) -> EngineResult<u64> {
        let mut chain = self.chain.write();
        let Some(finalized) = self.finality.lock().finalized else { return Ok(0) };
        let target = self.message_index_to_block_number(finalized.msg_idx);

        let next = self.ancients.ancients();
        if next > target {
            return Ok(0);
        }
        let end = target.min(next + self.config.freezer_batch_size.max(1) - 1);

        let blocks = (next..=end)
            .map(|number| {
                let index = self.block_number_to_message_index(number)?;
                chain
                    .block(index)
                    .map(L2Block::to_ancient)
                    .ok_or(EngineError::BlockNotFound(number))
            })
            .collect::<EngineResult<Vec<_>>>()?;
        self.ancients.append(&blocks)?;
        let frozen_count = self.block_number_to_message_index(end)? + 1;
        chain.prune(frozen_count, self.config.state_snapshot_interval);
        drop(chain);

        let frozen = blocks.len() as u64;
        self.metrics.blocks_frozen.increment(frozen);
        tracing::debug!(target: "rollup::engine", from = next, to = end, "froze finalized blocks");

        Ok(frozen)
    }

    /// Freezes every finalized block not yet in the ancient store, one batch at a time.
    pub fn freeze_pending(&self) -> EngineResult<u64> {
        let mut total = 0;
        loop {
            match self.freeze_batch()? {
                0 => return Ok(total),
                frozen => total += frozen,
            }
        }
    }
}

impl<S: StateTransition + 'static> ExecutionEngine<S> {
    /// Spawns the freezer task, woken whenever the finalized block moves.
    ///
    /// The chain lock is released between batches so block production is never held up by a
    /// large backlog. After a restart the task resumes from the ancient store head.
    pub fn spawn_freezer(
        self: Arc<Self>,
        cancel: CancellationToken,
        fatal: FatalErrorSender,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut finalized = self.subscribe_finalized();
            tracing::info!(target: "rollup::engine", ancients = self.ancients.ancients(), "starting freezer");

            loop {
                loop {
                    match self.freeze_batch() {
                        Ok(0) => break,
                        Ok(_) => tokio::task::yield_now().await,
                        Err(err) => {
                            fatal.report(FatalError::new("freezer", &err));
                            return;
                        }
                    }
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    res = finalized.changed() => if res.is_err() { break },
                }
            }

            tracing::info!(target: "rollup::engine", "freezer stopped");
        })
    }
}
