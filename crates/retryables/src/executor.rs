use crate::{intrinsic_gas, RetryableTicket};
use std::fmt::Debug;

/// The outcome of executing the call of a retryable ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// The call succeeded.
    Succeeded,
    /// The call reverted or ran out of gas.
    Failed(String),
}

/// Executes the call of a retryable ticket.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait RedeemExecutor: Debug + Send + Sync {
    /// Executes the ticket call with the gas.
    fn execute(&self, ticket: &RetryableTicket, gas: u64) -> RedeemOutcome;
}

/// A [`RedeemExecutor`] whose calls succeed when the gas covers the intrinsic cost of the
/// calldata.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRedeemExecutor;

impl RedeemExecutor for DefaultRedeemExecutor {
    fn execute(&self, ticket: &RetryableTicket, gas: u64) -> RedeemOutcome {
        let required = intrinsic_gas(&ticket.calldata);
        if gas < required {
            return RedeemOutcome::Failed(format!("out of gas: have {gas}, want {required}"));
        }
        RedeemOutcome::Succeeded
    }
}
