use crate::DecodingError;
use alloy_primitives::Bytes;
use alloy_rlp::{Decodable, Encodable};
use rollup_primitives::L2Transaction;

/// The L2 message body kind of a transaction list.
pub const L2_MESSAGE_KIND_BATCH: u8 = 3;

/// Encodes the transactions into an L2 message body.
pub fn encode_l2_transactions(transactions: &[L2Transaction]) -> Bytes {
    let mut out = vec![L2_MESSAGE_KIND_BATCH];
    transactions.to_vec().encode(&mut out);
    out.into()
}

/// Decodes the transactions from an L2 message body.
pub fn decode_l2_transactions(body: &[u8]) -> Result<Vec<L2Transaction>, DecodingError> {
    let Some((&kind, mut rest)) = body.split_first() else {
        return Ok(Vec::new());
    };
    if kind != L2_MESSAGE_KIND_BATCH {
        return Err(DecodingError::UnknownL2MessageKind(kind));
    }
    let transactions = Vec::<L2Transaction>::decode(&mut rest)?;
    if !rest.is_empty() {
        return Err(alloy_rlp::Error::UnexpectedLength.into());
    }
    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};

    #[test]
    fn test_should_decode_transactions() -> eyre::Result<()> {
        let tx = L2Transaction {
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            nonce: 0,
            gas_limit: 21_000,
            max_fee_per_gas: U256::from(10),
            value: U256::from(1),
            input: Bytes::new(),
        };

        let body = encode_l2_transactions(&[tx.clone(), tx.clone()]);

        assert_eq!(decode_l2_transactions(&body)?, vec![tx.clone(), tx]);
        assert!(decode_l2_transactions(&[]).unwrap().is_empty());
        assert!(matches!(
            decode_l2_transactions(&[0x04, 0xc0]),
            Err(DecodingError::UnknownL2MessageKind(0x04))
        ));

        Ok(())
    }
}
