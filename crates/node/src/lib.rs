//! The rollup node wiring message extraction, execution, finality and sequencing together.

mod args;
pub use args::{
    ChainArgs, DevArgs, EngineArgs, ExtractorArgs, RetryableArgs, RollupNodeArgs, SequencerArgs,
    SyncMonitorArgs,
};

mod constants;

mod dev;
pub use dev::DevParentChain;

mod node;
pub use node::{RollupNode, RollupNodeHandle};
