//! The channel used to surface protocol fatal errors to the node.

use tokio::sync::mpsc;

/// An error after which the node must stop making progress.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fatal error in {component}: {message}")]
pub struct FatalError {
    /// The component that raised the error.
    pub component: &'static str,
    /// The error description.
    pub message: String,
}

impl FatalError {
    /// Returns a new [`FatalError`] for the component.
    pub fn new(component: &'static str, error: impl std::fmt::Display) -> Self {
        Self { component, message: error.to_string() }
    }
}

/// Returns a connected pair of fatal error sender and receiver.
pub fn fatal_error_channel() -> (FatalErrorSender, FatalErrorReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FatalErrorSender(tx), FatalErrorReceiver(rx))
}

/// The sending half of the fatal error channel.
#[derive(Debug, Clone)]
pub struct FatalErrorSender(mpsc::UnboundedSender<FatalError>);

impl FatalErrorSender {
    /// Reports a fatal error.
    pub fn report(&self, error: FatalError) {
        tracing::error!(target: "rollup::fatal", component = error.component, message = %error.message, "fatal error");
        // the receiver is only dropped once the node is shutting down.
        let _ = self.0.send(error);
    }
}

/// The receiving half of the fatal error channel.
#[derive(Debug)]
pub struct FatalErrorReceiver(mpsc::UnboundedReceiver<FatalError>);

impl FatalErrorReceiver {
    /// Waits for the next fatal error. Returns `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<FatalError> {
        self.0.recv().await
    }

    /// Returns a pending fatal error, if any.
    pub fn try_recv(&mut self) -> Option<FatalError> {
        self.0.try_recv().ok()
    }
}
