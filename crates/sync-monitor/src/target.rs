use rollup_engine::{EngineError, ExecutionEngine, StateTransition};
use rollup_primitives::ConsensusFinality;
use std::fmt::Debug;

/// The component the finality tiers are pushed into.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait FinalityTarget: Debug + Send + Sync {
    /// Sets the finality tiers.
    fn set_finality_data(&self, finality: &ConsensusFinality) -> Result<(), EngineError>;
}

impl<S: StateTransition> FinalityTarget for ExecutionEngine<S> {
    fn set_finality_data(&self, finality: &ConsensusFinality) -> Result<(), EngineError> {
        Self::set_finality_data(self, finality)
    }
}
