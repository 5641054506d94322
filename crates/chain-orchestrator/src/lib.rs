//! The chain orchestrator drives message extraction from the parent chain and resolves the
//! reorgs it detects.

mod config;
pub use config::{ChainOrchestratorConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_REORG_DETECTION_DEPTH};

mod error;
pub use error::{ChainOrchestratorError, ReorgError};

mod metrics;
use metrics::ChainOrchestratorMetrics;

mod reorg;
pub use reorg::ReorgCoordinator;

mod retry;
pub use retry::{CanRetry, Retry};

use rollup_db::MessageExtractionDb;
use rollup_engine::{DefaultStateTransition, ExecutionEngine, StateTransition};
use rollup_extractor::{
    DataAvailabilityReader, Extractor, ExtractorConfig, ParentChainReader, StepOutcome,
};
use rollup_primitives::{FatalError, FatalErrorSender, ParentChainHeader};
use rollup_sequencer::Sequencer;
use std::sync::Arc;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

/// Drives the [`Extractor`] along the parent chain and hands the reorgs it reports to the
/// [`ReorgCoordinator`].
#[derive(Debug)]
pub struct ChainOrchestrator<R, DB, S = DefaultStateTransition> {
    extractor: Extractor<R, DB>,
    coordinator: ReorgCoordinator<R, DB, S>,
    sequencer: Option<Arc<Sequencer>>,
    config: ChainOrchestratorConfig,
    metrics: ChainOrchestratorMetrics,
}

impl<R, DB, S> ChainOrchestrator<R, DB, S>
where
    R: ParentChainReader + Clone,
    DB: MessageExtractionDb + Clone,
    S: StateTransition,
{
    /// Returns a new [`ChainOrchestrator`] extracting into the message store of the engine.
    pub fn new(
        reader: R,
        db: DB,
        engine: Arc<ExecutionEngine<S>>,
        da_readers: Vec<Arc<dyn DataAvailabilityReader>>,
        extractor_config: ExtractorConfig,
        config: ChainOrchestratorConfig,
    ) -> Self {
        let extractor = Extractor::new(
            reader.clone(),
            db.clone(),
            engine.store().clone(),
            da_readers,
            extractor_config,
        );
        let coordinator = ReorgCoordinator::new(reader, db, engine, config.reorg_detection_depth);

        Self {
            extractor,
            coordinator,
            sequencer: None,
            config,
            metrics: ChainOrchestratorMetrics::default(),
        }
    }

    /// Forwards the parent chain heads to the sequencer.
    pub fn with_sequencer(mut self, sequencer: Arc<Sequencer>) -> Self {
        self.sequencer = Some(sequencer);
        self
    }

    /// Returns the extractor.
    pub const fn extractor(&self) -> &Extractor<R, DB> {
        &self.extractor
    }

    /// Returns the reorg coordinator.
    pub const fn coordinator(&self) -> &ReorgCoordinator<R, DB, S> {
        &self.coordinator
    }

    /// Performs one extractor transition. A required reorg is resolved before returning, and the
    /// extractor resumes from the common checkpoint.
    pub async fn step(&mut self) -> Result<StepOutcome, ChainOrchestratorError> {
        let outcome = self.extractor.step().await?;
        if let StepOutcome::ReorgRequired(trigger) = &outcome {
            let checkpoint = self
                .config
                .retry
                .retry("resolve_reorg", || self.coordinator.resolve(trigger))
                .await?;
            self.extractor.reset_to(checkpoint);
        }
        Ok(outcome)
    }

    fn handle_new_head(&self, head: Result<ParentChainHeader, RecvError>) -> bool {
        match head {
            Ok(header) => {
                self.metrics.new_heads.increment(1);
                if let Some(sequencer) = &self.sequencer {
                    sequencer.handle_new_parent_block(header.number);
                }
                true
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(target: "rollup::orchestrator", skipped, "lagging behind parent chain heads");
                true
            }
            Err(RecvError::Closed) => {
                tracing::warn!(target: "rollup::orchestrator", "parent chain heads closed, falling back to polling");
                false
            }
        }
    }
}

impl<R, DB, S> ChainOrchestrator<R, DB, S>
where
    R: ParentChainReader + Clone + 'static,
    DB: MessageExtractionDb + Clone + 'static,
    S: StateTransition + 'static,
{
    /// Spawns the extraction loop.
    ///
    /// Transient errors are retried with the configured backoff. Fatal errors are reported on the
    /// fatal error channel and stop the loop.
    pub fn spawn(self, cancel: CancellationToken, fatal: FatalErrorSender) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel, fatal))
    }

    async fn run(mut self, cancel: CancellationToken, fatal: FatalErrorSender) {
        let mut heads = Some(self.extractor.reader().subscribe_new_heads());
        let mut attempt = 0;
        tracing::info!(target: "rollup::orchestrator", "starting chain orchestrator");

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.step() => result,
            };

            match result {
                Ok(StepOutcome::Progressed | StepOutcome::ReorgRequired(_)) => attempt = 0,
                Ok(StepOutcome::Idle) => {
                    attempt = 0;
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        head = next_head(&mut heads) => {
                            if !self.handle_new_head(head) {
                                heads = None;
                            }
                        }
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Err(err) if err.is_fatal() => {
                    fatal.report(FatalError::new("orchestrator", &err));
                    break;
                }
                Err(err) => {
                    attempt += 1;
                    self.metrics.transient_errors.increment(1);
                    let delay = self.config.retry.delay(attempt);
                    tracing::warn!(target: "rollup::orchestrator", %err, attempt, ?delay, "extraction failed, backing off");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::info!(target: "rollup::orchestrator", "chain orchestrator stopped");
    }
}

async fn next_head(
    heads: &mut Option<broadcast::Receiver<ParentChainHeader>>,
) -> Result<ParentChainHeader, RecvError> {
    match heads {
        Some(heads) => heads.recv().await,
        None => std::future::pending().await,
    }
}
