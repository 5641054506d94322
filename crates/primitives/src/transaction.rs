use alloy_primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};

/// An L2 transaction carried in an [`crate::MessageKind::L2Message`] payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, RlpEncodable, RlpDecodable)]
#[cfg_attr(any(test, feature = "arbitrary"), derive(arbitrary::Arbitrary))]
pub struct L2Transaction {
    /// The sender.
    pub from: Address,
    /// The recipient. The zero address denotes a contract creation.
    pub to: Address,
    /// The sender nonce.
    pub nonce: u64,
    /// The gas limit.
    pub gas_limit: u64,
    /// The maximum fee per gas the sender is willing to pay.
    pub max_fee_per_gas: U256,
    /// The transferred value.
    pub value: U256,
    /// The calldata.
    pub input: Bytes,
}

impl L2Transaction {
    /// Returns the transaction hash.
    pub fn hash(&self) -> TxHash {
        keccak256(alloy_rlp::encode(self))
    }
}
