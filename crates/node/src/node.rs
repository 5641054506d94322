use crate::{
    dev::{spawn_dev_block_producer, DevParentChain},
    RollupNodeArgs,
};
use rollup_chain_orchestrator::ChainOrchestrator;
use rollup_db::{InMemoryExtractionDb, MessageExtractionDb, MessageStore};
use rollup_engine::ExecutionEngine;
use rollup_extractor::{DataAvailabilityReader, ParentChainReader};
use rollup_primitives::{fatal_error_channel, FatalError, FatalErrorReceiver};
use rollup_sequencer::Sequencer;
use rollup_sync_monitor::{ParentChainFinalitySource, SyncMonitor, SyncMonitorHandle};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The rollup node.
#[derive(Debug)]
pub struct RollupNode;

impl RollupNode {
    /// Launches the node against an in-process parent chain producing empty blocks.
    pub fn launch_dev(
        args: &RollupNodeArgs,
    ) -> eyre::Result<(RollupNodeHandle, Arc<DevParentChain>)> {
        let first = args.chain_args.parent_chain_genesis_block_number;
        let chain = Arc::new(DevParentChain::new(first));
        let mut handle = Self::launch(
            args,
            chain.clone(),
            Arc::new(InMemoryExtractionDb::new()),
            Vec::new(),
        )?;
        handle.tasks.push(spawn_dev_block_producer(
            chain.clone(),
            Duration::from_millis(args.dev_args.block_time),
            handle.cancel.child_token(),
        ));
        Ok((handle, chain))
    }

    /// Launches the node components against the parent chain.
    ///
    /// Every component runs in its own task under a child of the root cancellation token, and
    /// reports protocol fatal errors on the channel returned in the handle.
    pub fn launch<R, DB>(
        args: &RollupNodeArgs,
        reader: R,
        db: DB,
        da_readers: Vec<Arc<dyn DataAvailabilityReader>>,
    ) -> eyre::Result<RollupNodeHandle>
    where
        R: ParentChainReader + Clone + 'static,
        DB: MessageExtractionDb + Clone + 'static,
    {
        args.validate()?;
        let cancel = CancellationToken::new();
        let (fatal, fatal_rx) = fatal_error_channel();
        let mut tasks = Vec::new();

        let store = Arc::new(MessageStore::new());
        let engine = Arc::new(ExecutionEngine::new(args.engine_config(), store.clone()));
        tasks.push(engine.clone().spawn(cancel.child_token(), fatal.clone()));
        tasks.push(engine.clone().spawn_freezer(cancel.child_token(), fatal.clone()));

        let source = ParentChainFinalitySource::new(reader.clone(), store.clone());
        let (monitor, sync_monitor) =
            SyncMonitor::new(source, engine.clone(), args.sync_monitor_config());
        tasks.push(monitor.spawn(cancel.child_token(), fatal.clone()));

        let sequencer = args
            .sequencer_args
            .sequencer_enabled
            .then(|| Arc::new(Sequencer::new(store.clone(), args.sequencer_config())));
        if let Some(sequencer) = &sequencer {
            tasks.push(sequencer.clone().spawn(cancel.child_token()));
        }

        let mut orchestrator = ChainOrchestrator::new(
            reader,
            db,
            engine.clone(),
            da_readers,
            args.extractor_config(),
            args.chain_orchestrator_config(),
        );
        if let Some(sequencer) = &sequencer {
            orchestrator = orchestrator.with_sequencer(sequencer.clone());
        }
        tasks.push(orchestrator.spawn(cancel.child_token(), fatal));

        tracing::info!(
            target: "rollup::node",
            chain_id = args.chain_args.chain_id,
            parent_chain_id = args.chain_args.parent_chain_id,
            sequencer = sequencer.is_some(),
            "launched rollup node"
        );

        Ok(RollupNodeHandle { engine, sequencer, sync_monitor, cancel, fatal_rx, tasks })
    }
}

/// A handle to the running components of a [`RollupNode`].
#[derive(Debug)]
pub struct RollupNodeHandle {
    engine: Arc<ExecutionEngine>,
    sequencer: Option<Arc<Sequencer>>,
    sync_monitor: SyncMonitorHandle,
    cancel: CancellationToken,
    fatal_rx: FatalErrorReceiver,
    tasks: Vec<JoinHandle<()>>,
}

impl RollupNodeHandle {
    /// Returns the execution engine.
    pub const fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    /// Returns the sequencer, if enabled.
    pub const fn sequencer(&self) -> Option<&Arc<Sequencer>> {
        self.sequencer.as_ref()
    }

    /// Returns the sync monitor handle.
    pub const fn sync_monitor(&self) -> &SyncMonitorHandle {
        &self.sync_monitor
    }

    /// Waits for the first fatal error reported by a component. Returns `None` once every
    /// component stopped without reporting one.
    pub async fn fatal_error(&mut self) -> Option<FatalError> {
        self.fatal_rx.recv().await
    }

    /// Cancels every component and waits for their tasks to finish.
    pub async fn shutdown(self) {
        tracing::info!(target: "rollup::node", "shutting down rollup node");
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::error!(target: "rollup::node", ?err, "component task failed");
            }
        }
    }
}
