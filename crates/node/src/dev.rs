//! An in-process parent chain for local development.

use crate::constants::{DEV_FINALIZED_DEPTH, DEV_SAFE_DEPTH};
use alloy_primitives::{keccak256, B256, U256};
use parking_lot::RwLock;
use rollup_extractor::{ParentChainReader, ReaderError};
use rollup_primitives::{ParentChainBlock, ParentChainHeader};
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// The timestamp increment between two dev parent chain blocks, in seconds.
const DEV_BLOCK_TIMESTAMP_DELTA: u64 = 12;

/// The base fee of every dev parent chain block.
const DEV_BASE_FEE: u64 = 1_000_000_000;

/// A parent chain that only holds empty blocks, produced on demand.
///
/// The safe and finalized tags trail the head by [`DEV_SAFE_DEPTH`] and [`DEV_FINALIZED_DEPTH`]
/// blocks, and are unset until the chain is deep enough.
#[derive(Debug)]
pub struct DevParentChain {
    first: u64,
    headers: RwLock<Vec<ParentChainHeader>>,
    heads: broadcast::Sender<ParentChainHeader>,
}

impl DevParentChain {
    /// Returns a new chain holding a single block at `first`.
    pub fn new(first: u64) -> Self {
        let (heads, _) = broadcast::channel(128);
        let chain = Self { first, headers: RwLock::new(Vec::new()), heads };
        chain.produce_block();
        chain
    }

    /// Appends an empty block and returns its header.
    pub fn produce_block(&self) -> ParentChainHeader {
        let mut headers = self.headers.write();
        let (number, parent_hash) =
            headers.last().map_or((self.first, B256::ZERO), |h| (h.number + 1, h.hash));

        let mut preimage = number.to_be_bytes().to_vec();
        preimage.extend_from_slice(parent_hash.as_slice());
        let header = ParentChainHeader {
            number,
            hash: keccak256(&preimage),
            parent_hash,
            timestamp: number * DEV_BLOCK_TIMESTAMP_DELTA,
            base_fee: U256::from(DEV_BASE_FEE),
        };
        headers.push(header.clone());
        drop(headers);

        let _ = self.heads.send(header.clone());
        header
    }

    /// Returns the header at the number.
    pub fn header(&self, number: u64) -> Option<ParentChainHeader> {
        let index = number.checked_sub(self.first)? as usize;
        self.headers.read().get(index).cloned()
    }

    fn trailing(&self, depth: u64) -> Option<ParentChainHeader> {
        let head = self.headers.read().last()?.number;
        head.checked_sub(depth).filter(|n| *n >= self.first).and_then(|n| self.header(n))
    }
}

#[async_trait::async_trait]
impl ParentChainReader for DevParentChain {
    async fn block_by_number(&self, number: u64) -> Result<Option<ParentChainBlock>, ReaderError> {
        Ok(self.header(number).map(|header| ParentChainBlock::new(header, Vec::new())))
    }

    async fn header_by_number(
        &self,
        number: u64,
    ) -> Result<Option<ParentChainHeader>, ReaderError> {
        Ok(self.header(number))
    }

    async fn latest_header(&self) -> Result<ParentChainHeader, ReaderError> {
        self.headers.read().last().cloned().ok_or(ReaderError::MissingTag("latest"))
    }

    async fn safe_header(&self) -> Result<Option<ParentChainHeader>, ReaderError> {
        Ok(self.trailing(DEV_SAFE_DEPTH))
    }

    async fn finalized_header(&self) -> Result<Option<ParentChainHeader>, ReaderError> {
        Ok(self.trailing(DEV_FINALIZED_DEPTH))
    }

    fn subscribe_new_heads(&self) -> broadcast::Receiver<ParentChainHeader> {
        self.heads.subscribe()
    }
}

/// Spawns a task appending an empty block to the parent chain on every tick.
pub(crate) fn spawn_dev_block_producer(
    chain: Arc<DevParentChain>,
    block_time: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(block_time);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let header = chain.produce_block();
                    tracing::trace!(target: "rollup::node", number = header.number, "produced dev parent chain block");
                }
            }
        }
    })
}
