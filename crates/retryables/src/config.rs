use crate::TX_GAS;

/// The default lifetime of a retryable ticket, in seconds.
pub const DEFAULT_RETRYABLE_LIFETIME: u64 = 7 * 24 * 60 * 60;

/// The configuration of the [`crate::RetryableStateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryableConfig {
    /// The minimum gas a submission must provide to schedule an auto-redeem.
    pub auto_redeem_gas_threshold: u64,
    /// The lifetime of a ticket, in seconds.
    pub lifetime: u64,
}

impl Default for RetryableConfig {
    fn default() -> Self {
        Self { auto_redeem_gas_threshold: TX_GAS, lifetime: DEFAULT_RETRYABLE_LIFETIME }
    }
}
