use crate::{DataAvailabilityError, DataAvailabilityReader, ParentChainReader, ReaderError};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use parking_lot::{Mutex, RwLock};
use rollup_primitives::{
    DelayedInboxMessage, Message, ParentChainBlock, ParentChainEvent, ParentChainEventKind,
    ParentChainHeader, SequencerBatch,
};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::broadcast;

/// The block time of the [`MockParentChain`].
pub const MOCK_BLOCK_TIME: u64 = 12;

/// An in-memory parent chain.
#[derive(Debug)]
pub struct MockParentChain {
    blocks: RwLock<Vec<ParentChainBlock>>,
    first: u64,
    fork: Mutex<u64>,
    safe: RwLock<Option<u64>>,
    finalized: RwLock<Option<u64>>,
    unavailable: AtomicBool,
    heads: broadcast::Sender<ParentChainHeader>,
}

impl MockParentChain {
    /// Returns a new chain holding a single empty block at `first`.
    pub fn new(first: u64) -> Self {
        let (heads, _) = broadcast::channel(128);
        let chain = Self {
            blocks: RwLock::new(Vec::new()),
            first,
            fork: Mutex::new(0),
            safe: RwLock::new(None),
            finalized: RwLock::new(None),
            unavailable: AtomicBool::new(false),
            heads,
        };
        chain.push_block(Vec::new());
        chain
    }

    /// Appends a block emitting the events and returns its header.
    pub fn push_block(&self, events: Vec<ParentChainEvent>) -> ParentChainHeader {
        let fork = *self.fork.lock();
        let mut blocks = self.blocks.write();
        let (number, parent_hash) = blocks
            .last()
            .map_or((self.first, B256::ZERO), |b| (b.header.number + 1, b.header.hash));

        let mut preimage = number.to_be_bytes().to_vec();
        preimage.extend_from_slice(parent_hash.as_slice());
        preimage.extend_from_slice(&fork.to_be_bytes());
        let header = ParentChainHeader {
            number,
            hash: keccak256(&preimage),
            parent_hash,
            timestamp: number * MOCK_BLOCK_TIME,
            base_fee: U256::from(1_000_000_000u64),
        };
        blocks.push(ParentChainBlock::new(header.clone(), events));
        drop(blocks);

        let _ = self.heads.send(header.clone());
        header
    }

    /// Appends `count` empty blocks.
    pub fn push_empty_blocks(&self, count: usize) {
        for _ in 0..count {
            self.push_block(Vec::new());
        }
    }

    /// Drops every block at or above `number`. Blocks pushed afterwards get new hashes.
    pub fn reorg_from(&self, number: u64) {
        *self.fork.lock() += 1;
        self.blocks.write().truncate(number.saturating_sub(self.first) as usize);
    }

    /// Sets the safe block number.
    pub fn set_safe(&self, number: u64) {
        *self.safe.write() = Some(number);
    }

    /// Sets the finalized block number.
    pub fn set_finalized(&self, number: u64) {
        *self.finalized.write() = Some(number);
    }

    /// Makes every request fail until called with `false`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Returns the header at the number.
    pub fn header(&self, number: u64) -> Option<ParentChainHeader> {
        let index = number.checked_sub(self.first)? as usize;
        self.blocks.read().get(index).map(|b| b.header.clone())
    }

    fn check_available(&self) -> Result<(), ReaderError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(ReaderError::Request("connection refused".into()));
        }
        Ok(())
    }

    fn tagged(&self, number: Option<u64>) -> Option<ParentChainHeader> {
        number.and_then(|n| self.header(n))
    }
}

#[async_trait::async_trait]
impl ParentChainReader for MockParentChain {
    async fn block_by_number(&self, number: u64) -> Result<Option<ParentChainBlock>, ReaderError> {
        self.check_available()?;
        let Some(index) = number.checked_sub(self.first) else { return Ok(None) };
        Ok(self.blocks.read().get(index as usize).cloned())
    }

    async fn header_by_number(
        &self,
        number: u64,
    ) -> Result<Option<ParentChainHeader>, ReaderError> {
        self.check_available()?;
        Ok(self.header(number))
    }

    async fn latest_header(&self) -> Result<ParentChainHeader, ReaderError> {
        self.check_available()?;
        self.blocks.read().last().map(|b| b.header.clone()).ok_or(ReaderError::MissingTag("latest"))
    }

    async fn safe_header(&self) -> Result<Option<ParentChainHeader>, ReaderError> {
        self.check_available()?;
        Ok(self.tagged(*self.safe.read()))
    }

    async fn finalized_header(&self) -> Result<Option<ParentChainHeader>, ReaderError> {
        self.check_available()?;
        Ok(self.tagged(*self.finalized.read()))
    }

    fn subscribe_new_heads(&self) -> broadcast::Receiver<ParentChainHeader> {
        self.heads.subscribe()
    }
}

/// Builds the delayed inbox events, tracking the delayed inbox accumulator.
#[derive(Debug, Default)]
pub struct DelayedInboxBuilder {
    bridge: Address,
    next_seq_num: u64,
    acc: B256,
}

impl DelayedInboxBuilder {
    /// Returns a new builder for events emitted by the bridge.
    pub fn new(bridge: Address) -> Self {
        Self { bridge, ..Default::default() }
    }

    /// Returns the event adding the message to the delayed inbox.
    pub fn add(&mut self, message: Message) -> ParentChainEvent {
        let delayed =
            DelayedInboxMessage { seq_num: self.next_seq_num, before_inbox_acc: self.acc, message };
        self.acc = delayed.after_inbox_acc();
        self.next_seq_num += 1;
        ParentChainEvent {
            address: self.bridge,
            kind: ParentChainEventKind::DelayedMessageAdded(delayed),
        }
    }
}

/// Returns the event posting the batch to the sequencer inbox.
pub fn batch_event(
    inbox: Address,
    seq_num: u64,
    after_delayed_count: u64,
    data: Bytes,
) -> ParentChainEvent {
    ParentChainEvent {
        address: inbox,
        kind: ParentChainEventKind::BatchPosted(SequencerBatch { seq_num, after_delayed_count, data }),
    }
}

/// An in-memory data availability layer accepting a single header flag.
#[derive(Debug)]
pub struct MockDataAvailability {
    flag: u8,
    payloads: RwLock<HashMap<Bytes, Bytes>>,
    unavailable: AtomicBool,
}

impl MockDataAvailability {
    /// Returns a new data availability layer for the header flag.
    pub fn new(flag: u8) -> Self {
        Self { flag, payloads: RwLock::new(HashMap::new()), unavailable: AtomicBool::new(false) }
    }

    /// Stores the inline payload and returns the certificate referencing it.
    pub fn store(&self, payload: Bytes) -> Bytes {
        let mut certificate = vec![self.flag];
        certificate.extend_from_slice(keccak256(&payload).as_slice());
        let certificate = Bytes::from(certificate);
        self.payloads.write().insert(certificate.clone(), payload);
        certificate
    }

    /// Makes every fetch fail until called with `false`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl DataAvailabilityReader for MockDataAvailability {
    fn is_valid_header_byte(&self, flag: u8) -> bool {
        flag == self.flag
    }

    async fn fetch_batch_data(
        &self,
        seq_num: u64,
        payload: &[u8],
    ) -> Result<Bytes, DataAvailabilityError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(DataAvailabilityError::Unavailable(format!("batch {seq_num}")));
        }
        self.payloads.read().get(&Bytes::copy_from_slice(payload)).cloned().ok_or_else(|| {
            DataAvailabilityError::InvalidCertificate(format!("unknown certificate for batch {seq_num}"))
        })
    }
}
