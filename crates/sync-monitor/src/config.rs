use std::time::Duration;

/// The default interval between two finality pushes, in milliseconds.
pub const DEFAULT_FINALITY_PUSH_INTERVAL_MS: u64 = 1000;

/// The default capacity of the explicit push channel.
pub const DEFAULT_COMMAND_CHANNEL_SIZE: usize = 16;

/// Configuration for the [`crate::SyncMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMonitorConfig {
    /// The interval between two finality pushes.
    pub finality_push_interval: Duration,
    /// The capacity of the explicit push channel.
    pub command_channel_size: usize,
}

impl Default for SyncMonitorConfig {
    fn default() -> Self {
        Self {
            finality_push_interval: Duration::from_millis(DEFAULT_FINALITY_PUSH_INTERVAL_MS),
            command_channel_size: DEFAULT_COMMAND_CHANNEL_SIZE,
        }
    }
}
