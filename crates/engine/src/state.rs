use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_rlp::RlpEncodable;
use rollup_retryables::{RetryableConfig, RetryableStateMachine};
use std::collections::BTreeMap;

/// An account of the execution state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Account {
    /// The account nonce.
    pub nonce: u64,
    /// The account balance.
    pub balance: U256,
}

#[derive(RlpEncodable)]
struct AccountEntry {
    address: Address,
    nonce: u64,
    balance: U256,
}

/// The execution state after a block.
///
/// Accounts are kept ordered so the state root only depends on the contents of the state.
#[derive(Debug, Clone, Default)]
pub struct ExecutionState {
    accounts: BTreeMap<Address, Account>,
    retryables: RetryableStateMachine,
}

impl ExecutionState {
    /// Returns an empty state with the retryable configuration.
    pub fn new(retryables: RetryableConfig) -> Self {
        Self { accounts: BTreeMap::new(), retryables: RetryableStateMachine::new(retryables) }
    }

    /// Returns the account at the address.
    pub fn account(&self, address: Address) -> Account {
        self.accounts.get(&address).copied().unwrap_or_default()
    }

    /// Returns the balance of the address.
    pub fn balance(&self, address: Address) -> U256 {
        self.account(address).balance
    }

    /// Returns the nonce of the address.
    pub fn nonce(&self, address: Address) -> u64 {
        self.account(address).nonce
    }

    /// Credits the address with the value.
    pub fn credit(&mut self, address: Address, value: U256) {
        if value.is_zero() {
            return;
        }
        let account = self.accounts.entry(address).or_default();
        account.balance = account.balance.saturating_add(value);
    }

    /// Debits the value from the address. Returns `false`, leaving the state untouched, if the
    /// balance is too low.
    pub fn debit(&mut self, address: Address, value: U256) -> bool {
        if value.is_zero() {
            return true;
        }
        let Some(account) = self.accounts.get_mut(&address) else { return false };
        let Some(balance) = account.balance.checked_sub(value) else { return false };
        account.balance = balance;
        true
    }

    /// Moves the value between the addresses. Returns `false` if the sender balance is too low.
    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> bool {
        if !self.debit(from, value) {
            return false;
        }
        self.credit(to, value);
        true
    }

    /// Increments the nonce of the address.
    pub fn bump_nonce(&mut self, address: Address) {
        self.accounts.entry(address).or_default().nonce += 1;
    }

    /// Returns the retryable tickets.
    pub const fn retryables(&self) -> &RetryableStateMachine {
        &self.retryables
    }

    /// Returns the retryable tickets for mutation.
    pub fn retryables_mut(&mut self) -> &mut RetryableStateMachine {
        &mut self.retryables
    }

    /// Returns the commitment to the state.
    pub fn state_root(&self) -> B256 {
        let accounts: Vec<_> = self
            .accounts
            .iter()
            .filter(|(_, account)| **account != Account::default())
            .map(|(address, account)| AccountEntry {
                address: *address,
                nonce: account.nonce,
                balance: account.balance,
            })
            .collect();

        let mut preimage = alloy_rlp::encode(&accounts);
        preimage.extend_from_slice(self.retryables.commitment().as_slice());
        keccak256(preimage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_root_ignores_emptied_accounts() {
        let alice = Address::repeat_byte(1);
        let bob = Address::repeat_byte(2);
        let mut state = ExecutionState::default();
        let empty_root = state.state_root();

        state.credit(alice, U256::from(10));
        assert!(state.transfer(alice, bob, U256::from(10)));
        assert!(!state.transfer(alice, bob, U256::from(1)));
        assert!(state.transfer(bob, alice, U256::from(10)));
        assert!(state.debit(alice, U256::from(10)));

        assert_eq!(state.state_root(), empty_root);
        assert_eq!(state.balance(bob), U256::ZERO);
    }
}
