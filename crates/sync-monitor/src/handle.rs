use crate::SyncMonitorError;
use rollup_primitives::ConsensusFinality;
use tokio::sync::{mpsc, oneshot, watch};

/// The commands that can be sent to the [`crate::SyncMonitor`].
#[derive(Debug)]
pub(crate) enum SyncMonitorCommand {
    /// Push the finality tiers to the target, replying with the outcome.
    PushFinality(ConsensusFinality, oneshot::Sender<Result<(), SyncMonitorError>>),
}

/// The handle used to push finality to a running [`crate::SyncMonitor`].
#[derive(Debug, Clone)]
pub struct SyncMonitorHandle {
    to_monitor: mpsc::Sender<SyncMonitorCommand>,
    latest: watch::Receiver<Option<ConsensusFinality>>,
}

impl SyncMonitorHandle {
    pub(crate) const fn new(
        to_monitor: mpsc::Sender<SyncMonitorCommand>,
        latest: watch::Receiver<Option<ConsensusFinality>>,
    ) -> Self {
        Self { to_monitor, latest }
    }

    /// Pushes the finality tiers through the monitor and waits for the target's answer.
    pub async fn push_finality(&self, finality: ConsensusFinality) -> Result<(), SyncMonitorError> {
        let (tx, rx) = oneshot::channel();
        self.to_monitor
            .send(SyncMonitorCommand::PushFinality(finality, tx))
            .await
            .map_err(|_| SyncMonitorError::Stopped)?;
        rx.await.map_err(|_| SyncMonitorError::Stopped)?
    }

    /// Returns the last finality accepted by the target.
    pub fn latest_finality(&self) -> Option<ConsensusFinality> {
        *self.latest.borrow()
    }

    /// Returns a receiver of the finality accepted by the target.
    pub fn subscribe(&self) -> watch::Receiver<Option<ConsensusFinality>> {
        self.latest.clone()
    }
}
