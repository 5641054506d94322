use alloy_primitives::Address;

/// The configuration of the [`crate::Extractor`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// The parent chain id.
    pub parent_chain_id: u64,
    /// The parent chain block the initial derivation state is anchored at.
    pub genesis_block_number: u64,
    /// The sequencer inbox address batches are read from.
    pub sequencer_inbox: Address,
    /// The bridge address delayed messages are read from.
    pub bridge: Address,
}
