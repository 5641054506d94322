//! The immutable store for blocks at or below the finalized watermark.

use crate::AncientError;
use alloy_primitives::{Bytes, B256};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

/// The tables of the ancient store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::EnumIter, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum AncientTable {
    /// Block hashes.
    Hashes,
    /// Encoded block headers.
    Headers,
    /// Encoded block bodies.
    Bodies,
    /// Encoded block receipts.
    Receipts,
}

/// A block frozen into the ancient store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncientBlock {
    /// The block number.
    pub number: u64,
    /// The block hash.
    pub hash: B256,
    /// The encoded header.
    pub header: Bytes,
    /// The encoded body.
    pub body: Bytes,
    /// The encoded receipts.
    pub receipts: Bytes,
}

impl AncientBlock {
    fn item(&self, table: AncientTable) -> Bytes {
        match table {
            AncientTable::Hashes => Bytes::copy_from_slice(self.hash.as_slice()),
            AncientTable::Headers => self.header.clone(),
            AncientTable::Bodies => self.body.clone(),
            AncientTable::Receipts => self.receipts.clone(),
        }
    }
}

/// An append-only store of finalized blocks, indexed by block number.
///
/// Blocks below the first block of the chain are never produced: the store counts them as frozen
/// so that [`AncientStore::ancients`] is always the next block number to freeze.
#[derive(Debug)]
pub struct AncientStore {
    first: u64,
    tables: RwLock<BTreeMap<AncientTable, Vec<Bytes>>>,
}

impl Default for AncientStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AncientStore {
    /// Returns a new empty [`AncientStore`].
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Returns a new empty [`AncientStore`] for a chain whose first block is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            first,
            tables: RwLock::new(AncientTable::iter().map(|t| (t, Vec::new())).collect()),
        }
    }

    /// Returns the count of frozen blocks, which is also the next block number to freeze.
    pub fn ancients(&self) -> u64 {
        self.first + self.tables.read().get(&AncientTable::Hashes).map_or(0, |t| t.len() as u64)
    }

    /// Returns `true` if the table holds an item for the block number.
    pub fn has_ancient(&self, table: AncientTable, number: u64) -> bool {
        let Some(offset) = number.checked_sub(self.first) else { return false };
        self.tables.read().get(&table).is_some_and(|t| (offset as usize) < t.len())
    }

    /// Returns the item of the table for the block number.
    pub fn ancient(&self, table: AncientTable, number: u64) -> Option<Bytes> {
        let offset = number.checked_sub(self.first)?;
        self.tables.read().get(&table).and_then(|t| t.get(offset as usize).cloned())
    }

    /// Returns the block frozen at the number.
    pub fn block(&self, number: u64) -> Option<AncientBlock> {
        let offset = number.checked_sub(self.first)? as usize;
        let tables = self.tables.read();
        let item = |table: AncientTable| tables.get(&table).and_then(|t| t.get(offset)).cloned();

        Some(AncientBlock {
            number,
            hash: B256::try_from(item(AncientTable::Hashes)?.as_ref()).ok()?,
            header: item(AncientTable::Headers)?,
            body: item(AncientTable::Bodies)?,
            receipts: item(AncientTable::Receipts)?,
        })
    }

    /// Appends the blocks, which must start at [`AncientStore::ancients`] and be contiguous.
    pub fn append(&self, blocks: &[AncientBlock]) -> Result<u64, AncientError> {
        let mut tables = self.tables.write();
        let mut expected =
            self.first + tables.get(&AncientTable::Hashes).map_or(0, |t| t.len() as u64);
        for block in blocks {
            if block.number != expected {
                return Err(AncientError::OutOfOrder { expected, got: block.number });
            }
            expected += 1;
        }

        for block in blocks {
            for (table, items) in tables.iter_mut() {
                items.push(block.item(*table));
            }
        }
        Ok(expected)
    }

    /// Drops every item at or above block number `count`.
    pub fn truncate_head(&self, count: u64) {
        let len = count.saturating_sub(self.first) as usize;
        let mut tables = self.tables.write();
        for items in tables.values_mut() {
            items.truncate(len);
        }
        tracing::debug!(target: "rollup::db", count, "truncated ancient store head");
    }
}
