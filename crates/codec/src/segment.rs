use alloy_primitives::Bytes;
use alloy_rlp::{Decodable, Encodable};

/// Segment kind of an L2 message.
pub const SEGMENT_KIND_L2_MESSAGE: u8 = 0;
/// Segment kind that reads the next delayed message.
pub const SEGMENT_KIND_DELAYED_MESSAGES: u8 = 1;
/// Segment kind that advances the running timestamp.
pub const SEGMENT_KIND_ADVANCE_TIMESTAMP: u8 = 2;
/// Segment kind that advances the running parent chain block number.
pub const SEGMENT_KIND_ADVANCE_BLOCK_NUMBER: u8 = 3;
/// Segment kind of a zstd-compressed L2 message.
pub const SEGMENT_KIND_L2_MESSAGE_COMPRESSED: u8 = 4;

/// A segment of a sequencer batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// An L2 message body.
    L2Message(Bytes),
    /// A zstd-compressed L2 message body.
    L2MessageCompressed(Bytes),
    /// Reads the next delayed message.
    DelayedMessages,
    /// Advances the running timestamp by the delta.
    AdvanceTimestamp(u64),
    /// Advances the running parent chain block number by the delta.
    AdvanceBlockNumber(u64),
    /// An advance segment whose delta failed to decode.
    MalformedAdvance,
    /// An empty segment.
    Empty,
    /// A segment of unknown kind.
    Unknown(u8),
}

impl Segment {
    /// Parses a raw segment.
    pub fn parse(raw: &[u8]) -> Self {
        let Some((&kind, body)) = raw.split_first() else { return Self::Empty };
        match kind {
            SEGMENT_KIND_L2_MESSAGE => Self::L2Message(Bytes::copy_from_slice(body)),
            SEGMENT_KIND_L2_MESSAGE_COMPRESSED => {
                Self::L2MessageCompressed(Bytes::copy_from_slice(body))
            }
            SEGMENT_KIND_DELAYED_MESSAGES => Self::DelayedMessages,
            SEGMENT_KIND_ADVANCE_TIMESTAMP | SEGMENT_KIND_ADVANCE_BLOCK_NUMBER => {
                let Ok(delta) = u64::decode(&mut &body[..]) else {
                    tracing::warn!(target: "rollup::codec", kind, "failed to parse advancing segment");
                    return Self::MalformedAdvance
                };
                if kind == SEGMENT_KIND_ADVANCE_TIMESTAMP {
                    Self::AdvanceTimestamp(delta)
                } else {
                    Self::AdvanceBlockNumber(delta)
                }
            }
            kind => Self::Unknown(kind),
        }
    }

    /// Returns `true` if the segment only moves the running timestamp or block number.
    pub const fn is_advance(&self) -> bool {
        matches!(self, Self::AdvanceTimestamp(_) | Self::AdvanceBlockNumber(_) | Self::MalformedAdvance)
    }

    /// Returns the raw encoding of the segment.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::L2Message(body) => {
                out.push(SEGMENT_KIND_L2_MESSAGE);
                out.extend_from_slice(body);
            }
            Self::L2MessageCompressed(body) => {
                out.push(SEGMENT_KIND_L2_MESSAGE_COMPRESSED);
                out.extend_from_slice(body);
            }
            Self::DelayedMessages => out.push(SEGMENT_KIND_DELAYED_MESSAGES),
            Self::AdvanceTimestamp(delta) => {
                out.push(SEGMENT_KIND_ADVANCE_TIMESTAMP);
                delta.encode(&mut out);
            }
            Self::AdvanceBlockNumber(delta) => {
                out.push(SEGMENT_KIND_ADVANCE_BLOCK_NUMBER);
                delta.encode(&mut out);
            }
            // encodes as an advance with a truncated delta.
            Self::MalformedAdvance => out.extend_from_slice(&[SEGMENT_KIND_ADVANCE_TIMESTAMP, 0x81]),
            Self::Empty => {}
            Self::Unknown(kind) => out.push(*kind),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_segments() {
        assert_eq!(Segment::parse(&[]), Segment::Empty);
        assert_eq!(Segment::parse(&[1]), Segment::DelayedMessages);
        assert_eq!(Segment::parse(&[0, 0xde, 0xad]), Segment::L2Message(Bytes::from_static(&[0xde, 0xad])));
        assert_eq!(Segment::parse(&[2, 0x0a]), Segment::AdvanceTimestamp(10));
        assert_eq!(Segment::parse(&[3, 0x82, 0x01, 0x00]), Segment::AdvanceBlockNumber(256));
        assert_eq!(Segment::parse(&[9]), Segment::Unknown(9));
    }

    #[test]
    fn test_malformed_advance_is_not_fatal() {
        assert_eq!(Segment::parse(&[2, 0x81]), Segment::MalformedAdvance);
        assert_eq!(Segment::parse(&Segment::MalformedAdvance.encode()), Segment::MalformedAdvance);
    }
}
