//! The payload of a [`MessageKind::SubmitRetryable`] message.

use crate::RetryableError;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use rollup_primitives::{Message, MessageKind};

/// The gas charged for any call.
pub const TX_GAS: u64 = 21_000;
/// The gas charged per zero calldata byte.
pub const TX_DATA_ZERO_GAS: u64 = 4;
/// The gas charged per non-zero calldata byte.
pub const TX_DATA_NON_ZERO_GAS: u64 = 16;

const WORD: usize = 32;

/// Returns the intrinsic gas of a call with the calldata.
pub fn intrinsic_gas(calldata: &[u8]) -> u64 {
    let zeros = calldata.iter().filter(|b| **b == 0).count() as u64;
    let non_zeros = calldata.len() as u64 - zeros;
    TX_GAS + zeros * TX_DATA_ZERO_GAS + non_zeros * TX_DATA_NON_ZERO_GAS
}

/// Returns the id of the ticket created by the message.
///
/// The request id assigned by the delayed inbox is used when present, the hash of the message
/// otherwise.
pub fn ticket_id(message: &Message) -> B256 {
    message.header.request_id.unwrap_or_else(|| keccak256(message.serialize()))
}

/// Returns the account escrowing the call value of the ticket.
pub fn escrow_address(id: B256) -> Address {
    let mut preimage = b"retryable escrow".to_vec();
    preimage.extend_from_slice(id.as_slice());
    Address::from_word(keccak256(preimage))
}

/// A decoded retryable submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRetryable {
    /// The call destination. The zero address denotes a contract creation.
    pub to: Address,
    /// The value passed to the call.
    pub callvalue: U256,
    /// The amount deposited to the sender.
    pub deposit: U256,
    /// The maximum fee paid for the submission.
    pub max_submission_fee: U256,
    /// The address receiving the excess fees.
    pub fee_refund_address: Address,
    /// The address receiving the call value if the ticket expires or is cancelled.
    pub beneficiary: Address,
    /// The gas provided for the auto-redeem.
    pub gas_limit: u64,
    /// The maximum fee per gas bid for the auto-redeem.
    pub max_fee_per_gas: U256,
    /// The calldata.
    pub calldata: Bytes,
}

impl SubmitRetryable {
    /// Decodes the submission from the payload of a [`MessageKind::SubmitRetryable`] message.
    pub fn decode(payload: &[u8]) -> Result<Self, RetryableError> {
        let mut words = Words(payload);
        let to = words.address()?;
        let callvalue = words.u256()?;
        let deposit = words.u256()?;
        let max_submission_fee = words.u256()?;
        let fee_refund_address = words.address()?;
        let beneficiary = words.address()?;
        let gas_limit = words.u64("gas limit")?;
        let max_fee_per_gas = words.u256()?;
        let len = words.u64("calldata length")? as usize;
        let calldata = words.take(len).ok_or(RetryableError::MalformedSubmission("truncated calldata"))?;

        Ok(Self {
            to,
            callvalue,
            deposit,
            max_submission_fee,
            fee_refund_address,
            beneficiary,
            gas_limit,
            max_fee_per_gas,
            calldata: Bytes::copy_from_slice(calldata),
        })
    }

    /// Returns the payload of the submission.
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(9 * WORD + self.calldata.len());
        out.extend_from_slice(self.to.into_word().as_slice());
        out.extend_from_slice(&self.callvalue.to_be_bytes::<WORD>());
        out.extend_from_slice(&self.deposit.to_be_bytes::<WORD>());
        out.extend_from_slice(&self.max_submission_fee.to_be_bytes::<WORD>());
        out.extend_from_slice(self.fee_refund_address.into_word().as_slice());
        out.extend_from_slice(self.beneficiary.into_word().as_slice());
        out.extend_from_slice(&U256::from(self.gas_limit).to_be_bytes::<WORD>());
        out.extend_from_slice(&self.max_fee_per_gas.to_be_bytes::<WORD>());
        out.extend_from_slice(&U256::from(self.calldata.len()).to_be_bytes::<WORD>());
        out.extend_from_slice(&self.calldata);
        out.into()
    }

    /// Returns the gas required to schedule an auto-redeem, given the configured threshold.
    pub fn auto_redeem_gas_required(&self, threshold: u64) -> u64 {
        threshold.max(intrinsic_gas(&self.calldata))
    }
}

impl TryFrom<&Message> for SubmitRetryable {
    type Error = RetryableError;

    fn try_from(message: &Message) -> Result<Self, Self::Error> {
        if message.kind() != MessageKind::SubmitRetryable {
            return Err(RetryableError::MalformedSubmission("not a retryable submission"));
        }
        Self::decode(&message.payload)
    }
}

/// A reader over the 32 byte words of a payload.
struct Words<'a>(&'a [u8]);

impl<'a> Words<'a> {
    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.0.len() < len {
            return None;
        }
        let (head, tail) = self.0.split_at(len);
        self.0 = tail;
        Some(head)
    }

    fn word(&mut self) -> Result<&'a [u8], RetryableError> {
        self.take(WORD).ok_or(RetryableError::MalformedSubmission("truncated payload"))
    }

    fn u256(&mut self) -> Result<U256, RetryableError> {
        Ok(U256::from_be_slice(self.word()?))
    }

    fn address(&mut self) -> Result<Address, RetryableError> {
        Ok(Address::from_slice(&self.word()?[WORD - 20..]))
    }

    fn u64(&mut self, field: &'static str) -> Result<u64, RetryableError> {
        let value = self.u256()?;
        value.try_into().map_err(|_| {
            tracing::debug!(target: "rollup::retryables", field, %value, "retryable field overflows u64");
            RetryableError::MalformedSubmission("integer field overflows u64")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> SubmitRetryable {
        SubmitRetryable {
            to: Address::repeat_byte(0x01),
            callvalue: U256::from(10),
            deposit: U256::from(100),
            max_submission_fee: U256::from(5),
            fee_refund_address: Address::repeat_byte(0x02),
            beneficiary: Address::repeat_byte(0x03),
            gas_limit: 100_000,
            max_fee_per_gas: U256::from(1_000_000_000u64),
            calldata: Bytes::from_static(&[0, 0, 1, 2]),
        }
    }

    #[test]
    fn test_should_decode_submission_payload() -> eyre::Result<()> {
        let expected = submission();
        let payload = expected.encode();

        assert_eq!(payload.len(), 9 * 32 + 4);
        assert_eq!(SubmitRetryable::decode(&payload)?, expected);

        Ok(())
    }

    #[test]
    fn test_should_reject_truncated_calldata() {
        let payload = submission().encode();

        let res = SubmitRetryable::decode(&payload[..payload.len() - 1]);

        assert_eq!(res, Err(RetryableError::MalformedSubmission("truncated calldata")));
    }

    #[test]
    fn test_intrinsic_gas() {
        assert_eq!(intrinsic_gas(&[]), TX_GAS);
        assert_eq!(intrinsic_gas(&[0, 0, 1, 2]), TX_GAS + 2 * 4 + 2 * 16);
        assert_eq!(submission().auto_redeem_gas_required(50_000), 50_000);
    }
}
