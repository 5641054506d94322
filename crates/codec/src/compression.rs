//! ZSTD helpers.

use crate::error::{CodecError, DecodingError};
use std::io::Read;

/// The compression level used when encoding.
pub const COMPRESSION_LEVEL: i32 = 3;

/// Decompresses the provided data, failing if the output exceeds `limit` bytes.
pub fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>, DecodingError> {
    let decoder = zstd::stream::Decoder::new(data)
        .map_err(|err| DecodingError::DecompressionFailed(err.to_string()))?;

    // read one byte past the limit to detect oversized payloads.
    let mut output = Vec::new();
    decoder
        .take(limit as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|err| DecodingError::DecompressionFailed(err.to_string()))?;

    if output.len() > limit {
        return Err(DecodingError::DecompressedTooLarge(limit));
    }

    Ok(output)
}

/// Compresses the provided data.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(zstd::stream::encode_all(data, COMPRESSION_LEVEL)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_reject_oversized_output() -> eyre::Result<()> {
        let data = vec![7u8; 4096];
        let compressed = compress(&data)?;

        assert_eq!(decompress(&compressed, 4096)?, data);
        assert!(matches!(
            decompress(&compressed, 4095),
            Err(DecodingError::DecompressedTooLarge(4095))
        ));

        Ok(())
    }

    #[test]
    fn test_should_fail_on_garbage() {
        assert!(matches!(
            decompress(&[1, 2, 3, 4, 5], 1024),
            Err(DecodingError::DecompressionFailed(_))
        ));
    }
}
