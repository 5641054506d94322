use crate::{
    compression::{compress, decompress},
    error::{CodecError, DecodingError},
    flags::{is_zstd_message_header_byte, requires_data_availability_reader, ZSTD_MESSAGE_HEADER_BYTE},
    macros::from_be_bytes_slice_and_advance_buf,
    Segment, MAX_DECOMPRESSED_LEN,
};
use alloy_primitives::Bytes;
use alloy_rlp::{Encodable, Header};

/// The size of the header preceding every batch payload.
pub const BATCH_HEADER_SIZE: usize = 40;

/// The header of a sequencer batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchHeader {
    /// The lower bound on message timestamps.
    pub min_timestamp: u64,
    /// The upper bound on message timestamps.
    pub max_timestamp: u64,
    /// The lower bound on message parent chain block numbers.
    pub min_block_number: u64,
    /// The upper bound on message parent chain block numbers.
    pub max_block_number: u64,
    /// The count of delayed messages read once the batch is applied.
    pub after_delayed_messages: u64,
}

impl BatchHeader {
    /// Splits the serialized batch into its header and payload.
    pub fn split(data: &[u8]) -> Result<(Self, &[u8]), DecodingError> {
        if data.len() < BATCH_HEADER_SIZE {
            return Err(DecodingError::MissingHeader(data.len()));
        }
        let buf = &mut &data[..];
        let header = Self {
            min_timestamp: from_be_bytes_slice_and_advance_buf!(u64, buf),
            max_timestamp: from_be_bytes_slice_and_advance_buf!(u64, buf),
            min_block_number: from_be_bytes_slice_and_advance_buf!(u64, buf),
            max_block_number: from_be_bytes_slice_and_advance_buf!(u64, buf),
            after_delayed_messages: from_be_bytes_slice_and_advance_buf!(u64, buf),
        };
        Ok((header, *buf))
    }

    /// Returns the 40 bytes encoding of the header.
    pub fn encode(&self) -> [u8; BATCH_HEADER_SIZE] {
        let mut out = [0u8; BATCH_HEADER_SIZE];
        for (i, word) in [
            self.min_timestamp,
            self.max_timestamp,
            self.min_block_number,
            self.max_block_number,
            self.after_delayed_messages,
        ]
        .into_iter()
        .enumerate()
        {
            out[i * 8..(i + 1) * 8].copy_from_slice(&word.to_be_bytes());
        }
        out
    }

    /// Clamps the running timestamp into the header bounds.
    pub fn clamp_timestamp(&self, timestamp: u64) -> u64 {
        timestamp.max(self.min_timestamp).min(self.max_timestamp.max(self.min_timestamp))
    }

    /// Clamps the running block number into the header bounds.
    pub fn clamp_block_number(&self, block_number: u64) -> u64 {
        block_number.max(self.min_block_number).min(self.max_block_number.max(self.min_block_number))
    }
}

/// A decoded sequencer batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencerMessage {
    /// The batch header.
    pub header: BatchHeader,
    /// The raw segments of the batch.
    pub segments: Vec<Bytes>,
}

impl SequencerMessage {
    /// Decodes a serialized batch whose payload is inline. Payloads that reference external data
    /// must be resolved through a data availability reader first.
    pub fn decode(data: &[u8]) -> Result<Self, DecodingError> {
        let (header, payload) = BatchHeader::split(data)?;
        let Some((&flag, body)) = payload.split_first() else {
            // a batch without payload only reads delayed messages.
            return Ok(Self { header, segments: Vec::new() })
        };

        if requires_data_availability_reader(flag) {
            return Err(DecodingError::UnresolvedPayload(flag));
        }
        if !is_zstd_message_header_byte(flag) {
            return Err(DecodingError::UnknownHeaderFlag(flag));
        }

        let decompressed = decompress(body, MAX_DECOMPRESSED_LEN)?;
        Ok(Self { header, segments: decode_segments(&decompressed) })
    }

    /// Returns the parsed segments.
    pub fn parsed_segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.segments.iter().map(|raw| Segment::parse(raw))
    }

    /// Encodes the batch with an inline zstd payload.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let mut stream = Vec::new();
        for segment in &self.segments {
            segment[..].encode(&mut stream);
        }

        let mut out = self.header.encode().to_vec();
        out.push(ZSTD_MESSAGE_HEADER_BYTE);
        out.extend(compress(&stream)?);
        Ok(out.into())
    }

    /// Builds a batch from the header and segments.
    pub fn from_segments(header: BatchHeader, segments: impl IntoIterator<Item = Segment>) -> Self {
        Self { header, segments: segments.into_iter().map(|s| s.encode().into()).collect() }
    }
}

/// Decodes the stream of RLP strings. A malformed tail ends the stream.
fn decode_segments(mut stream: &[u8]) -> Vec<Bytes> {
    let mut segments = Vec::new();
    while !stream.is_empty() {
        match Header::decode_bytes(&mut stream, false) {
            Ok(segment) => segments.push(Bytes::copy_from_slice(segment)),
            Err(err) => {
                tracing::warn!(target: "rollup::codec", ?err, "error parsing sequencer message segment");
                break
            }
        }
    }
    segments
}
