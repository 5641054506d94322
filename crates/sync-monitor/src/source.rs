use crate::SyncMonitorError;
use rollup_db::MessageStore;
use rollup_extractor::ParentChainReader;
use rollup_primitives::{ConsensusFinality, FinalityData, ParentChainHeader};
use std::{fmt::Debug, sync::Arc};

/// Yields the consensus side view of the finality tiers.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait FinalitySource: Debug + Send + Sync {
    /// Returns the current finality tiers.
    async fn finality(&self) -> Result<ConsensusFinality, SyncMonitorError>;
}

/// Derives the finality tiers from the safe and finalized blocks of the parent chain.
///
/// A tier points at the last message extracted from a parent chain block at or below the
/// tagged block, with the block hash the engine recorded for that message. The source never
/// vouches for a validated tier.
#[derive(Debug)]
pub struct ParentChainFinalitySource<R> {
    reader: R,
    store: Arc<MessageStore>,
}

impl<R> ParentChainFinalitySource<R> {
    /// Returns a new [`ParentChainFinalitySource`].
    pub const fn new(reader: R, store: Arc<MessageStore>) -> Self {
        Self { reader, store }
    }

    fn tier(
        &self,
        header: Option<ParentChainHeader>,
    ) -> Result<Option<FinalityData>, SyncMonitorError> {
        let Some(header) = header else { return Ok(None) };
        let Some(index) = self.store.last_index_with_origin_at_or_below(header.number) else {
            return Ok(None)
        };
        let result = self.store.result(index).ok_or(SyncMonitorError::MissingResult(index))?;
        Ok(Some(FinalityData::new(index, result.block_hash)))
    }
}

#[async_trait::async_trait]
impl<R: ParentChainReader> FinalitySource for ParentChainFinalitySource<R> {
    async fn finality(&self) -> Result<ConsensusFinality, SyncMonitorError> {
        let safe = self.reader.safe_header().await?;
        let finalized = self.reader.finalized_header().await?;

        Ok(ConsensusFinality {
            safe: self.tier(safe)?,
            finalized: self.tier(finalized)?,
            validated: None,
        })
    }
}
