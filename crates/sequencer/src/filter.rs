//! Transaction and block filters applied during block production.
//!
//! Filters run synchronously on the block production path: they may only read their own state
//! and the candidate transactions.

use crate::FilterRejection;
use alloy_primitives::{Address, TxHash};
use rollup_primitives::L2Transaction;
use std::{collections::HashSet, fmt::Debug};

/// A predicate over a single candidate transaction. A rejection drops the transaction and
/// production continues with the next one.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait TxFilter: Debug + Send + Sync {
    /// Returns the name of the filter.
    fn name(&self) -> &'static str;

    /// Checks the transaction.
    fn check_transaction(&self, tx: &L2Transaction) -> Result<(), FilterRejection>;
}

/// A predicate over the final transaction set of a block. A rejection aborts the production of
/// the whole block.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait BlockFilter: Debug + Send + Sync {
    /// Returns the name of the filter.
    fn name(&self) -> &'static str;

    /// Checks the transactions of the block.
    fn check_block(&self, transactions: &[L2Transaction]) -> Result<(), FilterRejection>;
}

/// Accepts transactions from whitelisted senders only.
#[derive(Debug, Clone, Default)]
pub struct SenderWhitelist {
    senders: HashSet<Address>,
}

impl SenderWhitelist {
    /// Returns a whitelist of the senders.
    pub fn new(senders: impl IntoIterator<Item = Address>) -> Self {
        Self { senders: senders.into_iter().collect() }
    }
}

impl TxFilter for SenderWhitelist {
    fn name(&self) -> &'static str {
        "sender_whitelist"
    }

    fn check_transaction(&self, tx: &L2Transaction) -> Result<(), FilterRejection> {
        if self.senders.contains(&tx.from) {
            return Ok(());
        }
        Err(FilterRejection::new(format!("sender {} is not whitelisted", tx.from)))
    }
}

/// Rejects listed transactions and every transaction from listed senders.
#[derive(Debug, Clone, Default)]
pub struct CensorList {
    transactions: HashSet<TxHash>,
    senders: HashSet<Address>,
}

impl CensorList {
    /// Returns an empty [`CensorList`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the transaction hash to the list.
    pub fn with_transaction(mut self, hash: TxHash) -> Self {
        self.transactions.insert(hash);
        self
    }

    /// Adds the sender to the list.
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.senders.insert(sender);
        self
    }
}

impl TxFilter for CensorList {
    fn name(&self) -> &'static str {
        "censor_list"
    }

    fn check_transaction(&self, tx: &L2Transaction) -> Result<(), FilterRejection> {
        if self.senders.contains(&tx.from) {
            return Err(FilterRejection::new(format!("sender {} is censored", tx.from)));
        }
        let hash = tx.hash();
        if self.transactions.contains(&hash) {
            return Err(FilterRejection::new(format!("transaction {hash} is censored")));
        }
        Ok(())
    }
}

/// Rejects transactions whose calldata exceeds a size.
#[derive(Debug, Clone, Copy)]
pub struct MaxTxDataSize(pub usize);

impl TxFilter for MaxTxDataSize {
    fn name(&self) -> &'static str {
        "max_tx_data_size"
    }

    fn check_transaction(&self, tx: &L2Transaction) -> Result<(), FilterRejection> {
        if tx.input.len() > self.0 {
            return Err(FilterRejection::new(format!(
                "calldata of {} bytes exceeds {} bytes",
                tx.input.len(),
                self.0
            )));
        }
        Ok(())
    }
}

/// Rejects blocks whose transactions claim more gas than a limit.
#[derive(Debug, Clone, Copy)]
pub struct MaxBlockGas(pub u64);

impl BlockFilter for MaxBlockGas {
    fn name(&self) -> &'static str {
        "max_block_gas"
    }

    fn check_block(&self, transactions: &[L2Transaction]) -> Result<(), FilterRejection> {
        let gas = transactions.iter().fold(0u64, |acc, tx| acc.saturating_add(tx.gas_limit));
        if gas > self.0 {
            return Err(FilterRejection::new(format!("block gas {gas} exceeds limit {}", self.0)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_primitives::random;

    #[test]
    fn test_censor_list_matches_hash_and_sender() {
        let tx = random!(L2Transaction);
        let other = L2Transaction { from: Address::repeat_byte(9), ..random!(L2Transaction) };

        let by_hash = CensorList::new().with_transaction(tx.hash());
        let by_sender = CensorList::new().with_sender(other.from);

        assert!(by_hash.check_transaction(&tx).is_err());
        assert!(by_hash.check_transaction(&other).is_ok() || other.hash() == tx.hash());
        assert!(by_sender.check_transaction(&other).is_err());
    }

    #[test]
    fn test_max_block_gas_sums_gas_limits() {
        let tx = |gas_limit| L2Transaction { gas_limit, ..random!(L2Transaction) };
        let filter = MaxBlockGas(50_000);

        assert!(filter.check_block(&[tx(21_000), tx(29_000)]).is_ok());
        assert!(filter.check_block(&[tx(21_000), tx(29_001)]).is_err());
        assert!(filter.check_block(&[tx(u64::MAX), tx(1)]).is_err());
    }
}
