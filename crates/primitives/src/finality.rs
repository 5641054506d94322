use crate::MessageIndex;
use alloy_primitives::B256;

/// A finality claim about the block produced by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[cfg_attr(any(test, feature = "arbitrary"), derive(arbitrary::Arbitrary))]
#[display("FinalityData {{ msg_idx: {msg_idx}, block_hash: {block_hash} }}")]
pub struct FinalityData {
    /// The index of the message.
    pub msg_idx: MessageIndex,
    /// The hash of the block produced by the message.
    pub block_hash: B256,
}

impl FinalityData {
    /// Returns a new instance of [`FinalityData`].
    pub const fn new(msg_idx: MessageIndex, block_hash: B256) -> Self {
        Self { msg_idx, block_hash }
    }
}

/// The consensus side view of the finality tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsensusFinality {
    /// The safe tier.
    pub safe: Option<FinalityData>,
    /// The finalized tier.
    pub finalized: Option<FinalityData>,
    /// The validated tier, when block validation is running.
    pub validated: Option<FinalityData>,
}
