use alloy_primitives::{keccak256, B256};

/// Extends the hash chain `acc` with `bytes`, returning `keccak256(acc || bytes)`.
pub fn accumulate(acc: B256, bytes: &[u8]) -> B256 {
    let mut preimage = Vec::with_capacity(B256::len_bytes() + bytes.len());
    preimage.extend_from_slice(acc.as_slice());
    preimage.extend_from_slice(bytes);
    keccak256(preimage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_is_chained() {
        let first = accumulate(B256::ZERO, b"a");
        let second = accumulate(first, b"b");

        assert_ne!(first, second);
        assert_eq!(second, accumulate(accumulate(B256::ZERO, b"a"), b"b"));
        assert_ne!(second, accumulate(B256::ZERO, b"ab"));
    }
}
