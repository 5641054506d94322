//! Message extraction from the parent chain for the rollup node.

mod batch;

mod config;
pub use config::ExtractorConfig;

mod error;
pub use error::{DataAvailabilityError, ExtractorError, MalformedMessageError, ReaderError};

mod extract;
pub use extract::{extract_messages, walk_forwards, ExtractedBlock};

mod metrics;
pub use metrics::ExtractorMetrics;

mod reader;
pub use reader::{DataAvailabilityReader, ParentChainReader};

#[cfg(any(test, feature = "test-utils"))]
/// Common test helpers
pub mod test_utils;

use error::ExtractorResult;
use rollup_db::{MessageExtractionDb, MessageStore, MessageStoreError};
use rollup_primitives::{BlockInfo, DerivationState, MessageIndex};
use std::sync::Arc;

/// The state of the [`Extractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractorState {
    /// The extractor has not loaded its derivation state yet.
    Start,
    /// The extractor waits for the block following the state.
    ProcessingNextBlock(DerivationState),
    /// The extractor commits the messages of a folded block.
    SavingMessages(Box<ExtractedBlock>),
    /// The extractor waits for a reorg to be resolved.
    Reorging(ReorgTrigger),
}

impl ExtractorState {
    /// Returns the name of the state.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ProcessingNextBlock(_) => "processing_next_block",
            Self::SavingMessages(_) => "saving_messages",
            Self::Reorging(_) => "reorging",
        }
    }
}

/// The event that requires a reorg to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorgTrigger {
    /// The parent chain no longer contains the last folded block of the state.
    ParentChain(DerivationState),
    /// An extracted message differs from the message stored at the index.
    Divergence(MessageIndex),
}

/// The outcome of an [`Extractor::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The extractor moved to its next state.
    Progressed,
    /// The extractor reached the head of the parent chain.
    Idle,
    /// A reorg must be resolved before calling [`Extractor::reset_to`].
    ReorgRequired(ReorgTrigger),
}

/// The message extractor walks the parent chain one block at a time, committing the derived
/// messages to the extraction database and the [`MessageStore`].
#[derive(Debug)]
pub struct Extractor<R, DB> {
    /// The parent chain reader.
    reader: R,
    /// The extraction database.
    db: DB,
    /// The canonical message log.
    store: Arc<MessageStore>,
    /// The installed data availability readers.
    da_readers: Vec<Arc<dyn DataAvailabilityReader>>,
    /// The extractor configuration.
    config: ExtractorConfig,
    /// The current state of the extractor.
    state: ExtractorState,
    /// The metrics for the extractor.
    metrics: ExtractorMetrics,
}

impl<R, DB> Extractor<R, DB>
where
    R: ParentChainReader,
    DB: MessageExtractionDb,
{
    /// Returns a new [`Extractor`] in the [`ExtractorState::Start`] state.
    pub fn new(
        reader: R,
        db: DB,
        store: Arc<MessageStore>,
        da_readers: Vec<Arc<dyn DataAvailabilityReader>>,
        config: ExtractorConfig,
    ) -> Self {
        Self {
            reader,
            db,
            store,
            da_readers,
            config,
            state: ExtractorState::Start,
            metrics: ExtractorMetrics::default(),
        }
    }

    /// Returns the current state of the extractor.
    pub const fn state(&self) -> &ExtractorState {
        &self.state
    }

    /// Returns the parent chain reader.
    pub const fn reader(&self) -> &R {
        &self.reader
    }

    /// Resumes extraction from the checkpoint once a reorg has been resolved.
    pub fn reset_to(&mut self, checkpoint: DerivationState) {
        tracing::info!(target: "rollup::extractor", block = checkpoint.parent_chain_block_number, msg_count = checkpoint.msg_count, "resetting extractor to checkpoint");
        self.metrics.head_block.set(checkpoint.parent_chain_block_number as f64);
        self.state = ExtractorState::ProcessingNextBlock(checkpoint);
    }

    /// Performs one transition of the extractor.
    ///
    /// On error the extractor stays in its current state, so the step can be retried.
    #[tracing::instrument(skip_all, fields(state = self.state.name()))]
    pub async fn step(&mut self) -> ExtractorResult<StepOutcome> {
        match &self.state {
            ExtractorState::Start => {
                let state = self.initialize().await?;
                match self.reconcile(&state).await {
                    Ok(()) => {}
                    Err(ExtractorError::MessageStore(MessageStoreError::Diverged { index })) => {
                        return Ok(self.require_reorg(ReorgTrigger::Divergence(index)));
                    }
                    Err(err) => return Err(err),
                }
                self.reset_to(state);
                Ok(StepOutcome::Progressed)
            }
            ExtractorState::ProcessingNextBlock(state) => {
                let state = state.clone();
                let latest = self.reader.latest_header().await?;
                if latest.number <= state.parent_chain_block_number {
                    // the head may have been replaced by a shorter chain.
                    let current = self.reader.header_by_number(state.parent_chain_block_number).await?;
                    if current.is_some_and(|header| header.hash != state.parent_chain_block_hash) {
                        return Ok(self.require_reorg(ReorgTrigger::ParentChain(state)));
                    }
                    return Ok(StepOutcome::Idle);
                }

                let number = state.parent_chain_block_number + 1;
                let Some(block) = self.reader.block_by_number(number).await? else {
                    return Ok(StepOutcome::Idle);
                };

                match extract_messages(&state, &block, &self.db, &self.da_readers).await {
                    Ok(extracted) => {
                        self.state = ExtractorState::SavingMessages(Box::new(extracted));
                        Ok(StepOutcome::Progressed)
                    }
                    Err(ExtractorError::ParentChainReorgDetected { number, expected, got }) => {
                        tracing::warn!(target: "rollup::extractor", number, ?expected, ?got, "parent chain reorg detected");
                        Ok(self.require_reorg(ReorgTrigger::ParentChain(state)))
                    }
                    Err(err) => {
                        if matches!(err, ExtractorError::DataUnavailable(_)) {
                            self.metrics.data_unavailable.increment(1);
                        }
                        Err(err)
                    }
                }
            }
            ExtractorState::SavingMessages(extracted) => {
                let extracted = extracted.clone();
                self.save(&extracted).await?;

                match self.store.push_messages(
                    extracted.first_index(),
                    &extracted.messages,
                    extracted.block_info(),
                ) {
                    Ok(()) => {}
                    Err(MessageStoreError::Diverged { index }) => {
                        return Ok(self.require_reorg(ReorgTrigger::Divergence(index)));
                    }
                    Err(err) => return Err(err.into()),
                }

                self.metrics.blocks_processed.increment(1);
                self.metrics.messages_extracted.increment(extracted.messages.len() as u64);
                self.metrics.delayed_messages_seen.increment(extracted.delayed_messages.len() as u64);
                tracing::debug!(target: "rollup::extractor", block = %extracted.block_info(), messages = extracted.messages.len(), "committed parent chain block");

                self.reset_to(extracted.state);
                Ok(StepOutcome::Progressed)
            }
            ExtractorState::Reorging(trigger) => Ok(StepOutcome::ReorgRequired(trigger.clone())),
        }
    }

    fn require_reorg(&mut self, trigger: ReorgTrigger) -> StepOutcome {
        self.metrics.reorgs_detected.increment(1);
        self.state = ExtractorState::Reorging(trigger.clone());
        StepOutcome::ReorgRequired(trigger)
    }

    /// Commits the extracted block, unless a previous attempt already did.
    async fn save(&self, extracted: &ExtractedBlock) -> ExtractorResult<()> {
        let committed = self.db.get_state(extracted.state.parent_chain_block_hash).await?;
        if committed.as_ref() == Some(&extracted.state) {
            return Ok(());
        }
        self.db
            .save_state(&extracted.state, &extracted.messages, &extracted.delayed_messages)
            .await?;
        Ok(())
    }

    /// Returns the head state of the database, anchoring a new initial state if it is empty.
    async fn initialize(&self) -> ExtractorResult<DerivationState> {
        if let Some(state) = self.db.head_state().await? {
            tracing::info!(target: "rollup::extractor", block = state.parent_chain_block_number, msg_count = state.msg_count, "resuming from stored derivation state");
            return Ok(state);
        }

        let number = self.config.genesis_block_number;
        let anchor =
            self.reader.header_by_number(number).await?.ok_or(ExtractorError::MissingBlock(number))?;
        let state = DerivationState::initial(
            self.config.parent_chain_id,
            &anchor,
            self.config.sequencer_inbox,
            self.config.bridge,
        );
        self.db.save_state(&state, &[], &[]).await?;
        tracing::info!(target: "rollup::extractor", block = %BlockInfo::from(&anchor), "anchored initial derivation state");

        Ok(state)
    }

    /// Pushes the messages committed to the database but missing from the store.
    async fn reconcile(&self, head: &DerivationState) -> ExtractorResult<()> {
        let stored = self.store.count();
        if stored >= head.msg_count {
            return Ok(());
        }
        let Some(mut prev) = self.db.latest_state_with_message_count_at_most(stored).await? else {
            return Ok(());
        };
        tracing::info!(target: "rollup::extractor", stored, extracted = head.msg_count, "reconciling message store");

        while prev.parent_chain_block_number < head.parent_chain_block_number {
            let number = prev.parent_chain_block_number + 1;
            let state = self
                .db
                .state_at_block_number(number)
                .await?
                .ok_or(ExtractorError::MissingState(number))?;
            if state.msg_count > prev.msg_count {
                let messages = self.db.messages(prev.msg_count..state.msg_count).await?;
                let origin = BlockInfo::new(number, state.parent_chain_block_hash);
                self.store.push_messages(prev.msg_count, &messages, origin)?;
            }
            prev = state;
        }

        Ok(())
    }
}
