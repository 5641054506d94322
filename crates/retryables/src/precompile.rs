//! Manual redeems through the retryable precompile.

use alloy_primitives::{address, Address, B256};
use rollup_primitives::L2Transaction;

/// The address of the retryable precompile.
pub const RETRYABLE_PRECOMPILE_ADDRESS: Address =
    address!("0x000000000000000000000000000000000000006e");

/// The selector of `redeem(bytes32)`.
pub const REDEEM_SELECTOR: [u8; 4] = [0xed, 0xa1, 0x12, 0x2c];

/// Returns the calldata redeeming the ticket.
pub fn encode_redeem_call(id: B256) -> Vec<u8> {
    let mut out = REDEEM_SELECTOR.to_vec();
    out.extend_from_slice(id.as_slice());
    out
}

/// Returns the ticket id of a `redeem(bytes32)` calldata.
pub fn decode_redeem_call(input: &[u8]) -> Option<B256> {
    let args = input.strip_prefix(&REDEEM_SELECTOR)?;
    (args.len() == 32).then(|| B256::from_slice(args))
}

/// Returns the ticket id redeemed by the transaction, if it calls the retryable precompile.
pub fn redeem_target(tx: &L2Transaction) -> Option<B256> {
    if tx.to != RETRYABLE_PRECOMPILE_ADDRESS {
        return None;
    }
    decode_redeem_call(&tx.input)
}
