use crate::{DataAvailabilityError, ReaderError};
use alloy_primitives::Bytes;
use rollup_primitives::{ParentChainBlock, ParentChainHeader};
use std::fmt::Debug;
use tokio::sync::broadcast;

/// Read access to the parent chain.
///
/// Blocks carry their hash and parent hash so the extractor can detect reorgs on its own.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait ParentChainReader: Debug + Send + Sync {
    /// Returns the canonical block at the number, along with the rollup events it emitted.
    async fn block_by_number(&self, number: u64) -> Result<Option<ParentChainBlock>, ReaderError>;

    /// Returns the canonical header at the number.
    async fn header_by_number(
        &self,
        number: u64,
    ) -> Result<Option<ParentChainHeader>, ReaderError>;

    /// Returns the latest header.
    async fn latest_header(&self) -> Result<ParentChainHeader, ReaderError>;

    /// Returns the safe header, if the parent chain has one.
    async fn safe_header(&self) -> Result<Option<ParentChainHeader>, ReaderError>;

    /// Returns the finalized header, if the parent chain has one.
    async fn finalized_header(&self) -> Result<Option<ParentChainHeader>, ReaderError>;

    /// Subscribes to the new heads of the parent chain.
    fn subscribe_new_heads(&self) -> broadcast::Receiver<ParentChainHeader>;
}

/// Resolves batch payloads posted through an external data availability layer.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait DataAvailabilityReader: Debug + Send + Sync {
    /// Returns `true` if the reader resolves payloads with the header flag.
    fn is_valid_header_byte(&self, flag: u8) -> bool;

    /// Resolves the payload of batch `seq_num`. The payload starts with the header flag. The
    /// returned data is an inline payload, starting with its own header flag.
    async fn fetch_batch_data(
        &self,
        seq_num: u64,
        payload: &[u8],
    ) -> Result<Bytes, DataAvailabilityError>;
}
