use alloy_primitives::{address, Address};

/// The default parent chain id.
pub(crate) const DEFAULT_PARENT_CHAIN_ID: u64 = 1;

/// The default L2 chain id.
pub(crate) const DEFAULT_CHAIN_ID: u64 = 412_346;

/// The default sequencer inbox address.
pub(crate) const DEFAULT_SEQUENCER_INBOX: Address =
    address!("0x1c479675ad559DC151F6Ec7ed3FbF8ceE79582B6");

/// The default bridge address.
pub(crate) const DEFAULT_BRIDGE: Address = address!("0x8315177aB297bA92A06054cE80a67Ed4DBd7ed3a");

/// The default block time of the dev parent chain, in milliseconds.
pub(crate) const DEFAULT_DEV_BLOCK_TIME_MS: u64 = 2_000;

/// The default number of parent chain blocks between the head and the safe block of the dev
/// parent chain.
pub(crate) const DEV_SAFE_DEPTH: u64 = 4;

/// The default number of parent chain blocks between the head and the finalized block of the dev
/// parent chain.
pub(crate) const DEV_FINALIZED_DEPTH: u64 = 8;
