//! Retryable tickets for the rollup node.
//!
//! A retryable ticket is created by a [`rollup_primitives::MessageKind::SubmitRetryable`]
//! message and lives in the execution state until a redeem succeeds or it expires. Redeems are
//! attempted automatically on submission when enough gas is provided, and manually through
//! transactions calling the [`RETRYABLE_PRECOMPILE_ADDRESS`].

mod config;
pub use config::{RetryableConfig, DEFAULT_RETRYABLE_LIFETIME};

mod error;
pub use error::RetryableError;

mod executor;
pub use executor::{DefaultRedeemExecutor, RedeemExecutor, RedeemOutcome};

mod machine;
pub use machine::{BlockContext, RetryableStateMachine};

mod metrics;

pub mod precompile;
pub use precompile::{redeem_target, RETRYABLE_PRECOMPILE_ADDRESS};

mod submission;
pub use submission::{
    escrow_address, intrinsic_gas, ticket_id, SubmitRetryable, TX_DATA_NON_ZERO_GAS,
    TX_DATA_ZERO_GAS, TX_GAS,
};

mod ticket;
pub use ticket::{RetryableEvent, RetryableReceipt, RetryableStatus, RetryableTicket};
