//! The sync monitor periodically pushes the consensus side finality tiers into the execution
//! engine.

mod config;
pub use config::{
    SyncMonitorConfig, DEFAULT_COMMAND_CHANNEL_SIZE, DEFAULT_FINALITY_PUSH_INTERVAL_MS,
};

mod error;
pub use error::SyncMonitorError;

mod handle;
use handle::SyncMonitorCommand;
pub use handle::SyncMonitorHandle;

mod metrics;
use metrics::SyncMonitorMetrics;

mod source;
pub use source::{FinalitySource, ParentChainFinalitySource};

mod target;
pub use target::FinalityTarget;

use rollup_primitives::{ConsensusFinality, FatalError, FatalErrorSender};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

/// Pushes the finality tiers yielded by a [`FinalitySource`] into a [`FinalityTarget`] on every
/// tick, and the tiers received through its [`SyncMonitorHandle`] as they arrive.
///
/// A failed push is retried on the next tick. A push the target rejects as fatal stops the
/// monitor and is reported on the fatal error channel.
#[derive(Debug)]
pub struct SyncMonitor<Src, T> {
    source: Src,
    target: T,
    config: SyncMonitorConfig,
    commands: mpsc::Receiver<SyncMonitorCommand>,
    latest: watch::Sender<Option<ConsensusFinality>>,
    metrics: SyncMonitorMetrics,
}

#[derive(Debug)]
enum MonitorEvent {
    Tick,
    Command(SyncMonitorCommand),
}

impl<Src: FinalitySource, T: FinalityTarget> SyncMonitor<Src, T> {
    /// Returns a new [`SyncMonitor`] and the handle to reach it.
    pub fn new(source: Src, target: T, config: SyncMonitorConfig) -> (Self, SyncMonitorHandle) {
        let (to_monitor, commands) = mpsc::channel(config.command_channel_size);
        let (latest, latest_rx) = watch::channel(None);
        let monitor = Self {
            source,
            target,
            config,
            commands,
            latest,
            metrics: SyncMonitorMetrics::default(),
        };
        (monitor, SyncMonitorHandle::new(to_monitor, latest_rx))
    }

    /// Reads the finality from the source and pushes it into the target.
    pub async fn sync_once(&self) -> Result<ConsensusFinality, SyncMonitorError> {
        let finality = self.source.finality().await.inspect_err(|_| {
            self.metrics.failed_pushes.increment(1);
        })?;
        self.push(finality)?;
        Ok(finality)
    }

    /// Returns the last finality accepted by the target.
    pub fn latest_finality(&self) -> Option<ConsensusFinality> {
        *self.latest.borrow()
    }

    fn push(&self, finality: ConsensusFinality) -> Result<(), SyncMonitorError> {
        if let Err(err) = self.target.set_finality_data(&finality) {
            self.metrics.failed_pushes.increment(1);
            return Err(err.into());
        }

        self.metrics.pushes.increment(1);
        if let Some(safe) = finality.safe {
            self.metrics.safe_message_index.set(safe.msg_idx as f64);
        }
        if let Some(finalized) = finality.finalized {
            self.metrics.finalized_message_index.set(finalized.msg_idx as f64);
        }
        tracing::trace!(target: "rollup::sync_monitor", safe = ?finality.safe, finalized = ?finality.finalized, "pushed finality");
        self.latest.send_replace(Some(finality));

        Ok(())
    }
}

impl<Src, T> SyncMonitor<Src, T>
where
    Src: FinalitySource + 'static,
    T: FinalityTarget + 'static,
{
    /// Spawns the monitor loop.
    pub fn spawn(self, cancel: CancellationToken, fatal: FatalErrorSender) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel, fatal))
    }

    async fn run(mut self, cancel: CancellationToken, fatal: FatalErrorSender) {
        let mut ticker = tokio::time::interval(self.config.finality_push_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(target: "rollup::sync_monitor", interval = ?self.config.finality_push_interval, "starting sync monitor");

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(command) = self.commands.recv() => MonitorEvent::Command(command),
                _ = ticker.tick() => MonitorEvent::Tick,
            };

            let result = match event {
                MonitorEvent::Tick => self.sync_once().await.map(|_| ()),
                MonitorEvent::Command(SyncMonitorCommand::PushFinality(finality, tx)) => {
                    let result = self.push(finality);
                    let _ = tx.send(result.clone());
                    result
                }
            };

            match result {
                Ok(()) => {}
                Err(err) if err.is_fatal() => {
                    tracing::error!(target: "rollup::sync_monitor", %err, "finality rejected by the engine");
                    fatal.report(FatalError::new("sync_monitor", &err));
                    break;
                }
                Err(err) => {
                    tracing::debug!(target: "rollup::sync_monitor", %err, "finality push failed, retrying on next tick");
                }
            }
        }

        tracing::info!(target: "rollup::sync_monitor", "sync monitor stopped");
    }
}
