//! The execution engine of the rollup node. The [`ExecutionEngine`] applies canonical messages in
//! order, tracks the safe, finalized and validated tiers of the produced chain and freezes
//! finalized blocks into the ancient store.

mod block;
pub use block::{BlockHeader, L2Block, Log, Receipt};

mod config;
pub use config::{
    EngineConfig, DEFAULT_FREEZER_BATCH_SIZE, DEFAULT_L2_BASE_FEE, DEFAULT_STATE_SNAPSHOT_INTERVAL,
};

mod engine;
pub use engine::{ExecutionEngine, ExecutionOutcome};

mod error;
pub use error::{EngineError, EngineResult};

mod finality;
pub use finality::FinalityTier;

mod metrics;

mod state;
pub use state::{Account, ExecutionState};

mod stf;
pub use stf::{retryable_log, BlockEnv, DefaultStateTransition, StateTransition};

#[cfg(any(test, feature = "test-utils"))]
/// Common test helpers
pub mod test_utils;
