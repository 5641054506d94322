/// An error occurring during the codec process.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An error occurring at the decoding stage.
    #[error(transparent)]
    Decoding(#[from] DecodingError),
    /// An error occurring while compressing data.
    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

/// An error occurring during the decoding.
#[derive(Debug, thiserror::Error)]
pub enum DecodingError {
    /// The batch is shorter than its header.
    #[error("batch of {0} bytes is missing its header")]
    MissingHeader(usize),
    /// The payload header flag is not known.
    #[error("unknown payload header flag {0:#04x}")]
    UnknownHeaderFlag(u8),
    /// The payload must be resolved by a data availability reader first.
    #[error("payload with header flag {0:#04x} must be resolved by a data availability reader")]
    UnresolvedPayload(u8),
    /// Decompression failed.
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),
    /// The decompressed data exceeds the allowed size.
    #[error("decompressed data exceeds {0} bytes")]
    DecompressedTooLarge(usize),
    /// The L2 message body kind is not known.
    #[error("unknown L2 message kind {0:#04x}")]
    UnknownL2MessageKind(u8),
    /// An RLP error.
    #[error("rlp error: {0}")]
    Rlp(#[from] alloy_rlp::Error),
}
