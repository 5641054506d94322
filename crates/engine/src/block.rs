//! L2 blocks produced by the execution engine.

use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};
use rollup_db::AncientBlock;
use rollup_primitives::{BlockInfo, L2Transaction, MessageIndex};

/// The header of an L2 block.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BlockHeader {
    /// The hash of the parent block.
    pub parent_hash: B256,
    /// The block number.
    pub number: u64,
    /// The block timestamp.
    pub timestamp: u64,
    /// The index of the message that produced the block.
    pub message_index: MessageIndex,
    /// The hash of the message that produced the block.
    pub message_hash: B256,
    /// The total count of delayed messages read once the block is applied.
    pub delayed_messages_read: u64,
    /// The commitment to the execution state after the block.
    pub state_root: B256,
    /// The commitment to the block transactions.
    pub transactions_root: B256,
    /// The commitment to the block receipts.
    pub receipts_root: B256,
}

impl BlockHeader {
    /// Returns the block hash.
    pub fn hash_slow(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }
}

/// A log emitted during the execution of a block.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Log {
    /// The emitting account.
    pub address: Address,
    /// The indexed topics.
    pub topics: Vec<B256>,
    /// The data.
    pub data: Bytes,
}

/// The receipt of a transaction or of a retryable operation.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Receipt {
    /// The transaction hash, or the ticket id for retryable operations.
    pub tx_hash: B256,
    /// Whether the operation succeeded.
    pub success: bool,
    /// The gas used.
    pub gas_used: u64,
    /// The emitted logs.
    pub logs: Vec<Log>,
}

/// A sealed L2 block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2Block {
    /// The block header.
    pub header: BlockHeader,
    /// The block hash.
    pub hash: B256,
    /// The included transactions.
    pub transactions: Vec<L2Transaction>,
    /// The receipts, in execution order.
    pub receipts: Vec<Receipt>,
}

impl L2Block {
    /// Seals the block, computing the roots and the hash.
    pub fn seal(
        mut header: BlockHeader,
        transactions: Vec<L2Transaction>,
        receipts: Vec<Receipt>,
    ) -> Self {
        header.transactions_root = keccak256(alloy_rlp::encode(&transactions));
        header.receipts_root = keccak256(alloy_rlp::encode(&receipts));
        let hash = header.hash_slow();
        Self { header, hash, transactions, receipts }
    }

    /// Returns the block number.
    pub const fn number(&self) -> u64 {
        self.header.number
    }

    /// Returns the index of the message that produced the block.
    pub const fn message_index(&self) -> MessageIndex {
        self.header.message_index
    }

    /// Returns the [`BlockInfo`] of the block.
    pub const fn block_info(&self) -> BlockInfo {
        BlockInfo::new(self.header.number, self.hash)
    }

    /// Returns the encoded block, ready to be moved into the ancient store.
    pub fn to_ancient(&self) -> AncientBlock {
        AncientBlock {
            number: self.header.number,
            hash: self.hash,
            header: alloy_rlp::encode(&self.header).into(),
            body: alloy_rlp::encode(&self.transactions).into(),
            receipts: alloy_rlp::encode(&self.receipts).into(),
        }
    }

    /// Decodes a block read back from the ancient store.
    pub fn from_ancient(ancient: &AncientBlock) -> alloy_rlp::Result<Self> {
        Ok(Self {
            header: BlockHeader::decode(&mut ancient.header.as_ref())?,
            hash: ancient.hash,
            transactions: Vec::decode(&mut ancient.body.as_ref())?,
            receipts: Vec::decode(&mut ancient.receipts.as_ref())?,
        })
    }
}
