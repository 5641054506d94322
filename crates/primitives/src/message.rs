//! Canonical L2 messages.

use alloy_primitives::{address, keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{
    length_of_length, Decodable, Encodable, Header, RlpDecodable, RlpEncodable, EMPTY_STRING_CODE,
};

/// The poster attributed to every message read from a sequencer batch.
pub const BATCH_POSTER_ADDRESS: Address = address!("0xa4b000000000000000000073657175656e636572");

/// The index of a message in the global message order.
pub type MessageIndex = u64;

/// The kind of a canonical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[cfg_attr(any(test, feature = "arbitrary"), derive(arbitrary::Arbitrary))]
#[repr(u8)]
pub enum MessageKind {
    /// A list of L2 transactions.
    L2Message = 3,
    /// Marks the end of a parent chain block.
    EndOfBlock = 6,
    /// An L2 message funded by a parent chain deposit.
    L2FundedByL1 = 7,
    /// A rollup protocol event.
    RollupEvent = 8,
    /// The submission of a retryable ticket.
    SubmitRetryable = 9,
    /// A batch used for gas estimation.
    BatchForGasEstimation = 10,
    /// The chain initialization message.
    Initialize = 11,
    /// A deposit of the native currency.
    EthDeposit = 12,
    /// A report of the batch poster's costs.
    BatchPostingReport = 13,
    /// A message that failed to parse. Executes as an empty block.
    Invalid = 0xff,
}

impl MessageKind {
    /// Returns `true` if messages of this kind only ever come through the delayed inbox.
    pub const fn is_delayed_only(&self) -> bool {
        matches!(
            self,
            Self::L2FundedByL1 |
                Self::SubmitRetryable |
                Self::EthDeposit |
                Self::Initialize |
                Self::RollupEvent |
                Self::BatchPostingReport
        )
    }
}

impl From<u8> for MessageKind {
    fn from(value: u8) -> Self {
        match value {
            3 => Self::L2Message,
            6 => Self::EndOfBlock,
            7 => Self::L2FundedByL1,
            8 => Self::RollupEvent,
            9 => Self::SubmitRetryable,
            10 => Self::BatchForGasEstimation,
            11 => Self::Initialize,
            12 => Self::EthDeposit,
            13 => Self::BatchPostingReport,
            _ => Self::Invalid,
        }
    }
}

impl Encodable for MessageKind {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        (*self as u8).encode(out)
    }

    fn length(&self) -> usize {
        (*self as u8).length()
    }
}

impl Decodable for MessageKind {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        Ok(u8::decode(buf)?.into())
    }
}

/// The header of a canonical message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(any(test, feature = "arbitrary"), derive(arbitrary::Arbitrary))]
pub struct MessageHeader {
    /// The message kind.
    pub kind: MessageKind,
    /// The account that posted the message on the parent chain.
    pub poster: Address,
    /// The parent chain block number the message is attributed to.
    pub block_number: u64,
    /// The timestamp the message is attributed to.
    pub timestamp: u64,
    /// The request id of delayed messages.
    pub request_id: Option<B256>,
    /// The parent chain base fee at the time of posting.
    pub base_fee: U256,
}

impl MessageHeader {
    fn fields_length(&self) -> usize {
        self.kind.length() +
            self.poster.length() +
            self.block_number.length() +
            self.timestamp.length() +
            self.request_id.as_ref().map_or(1, Encodable::length) +
            self.base_fee.length()
    }
}

impl Encodable for MessageHeader {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        Header { list: true, payload_length: self.fields_length() }.encode(out);
        self.kind.encode(out);
        self.poster.encode(out);
        self.block_number.encode(out);
        self.timestamp.encode(out);
        match &self.request_id {
            Some(id) => id.encode(out),
            None => out.put_u8(EMPTY_STRING_CODE),
        }
        self.base_fee.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.fields_length();
        payload_length + length_of_length(payload_length)
    }
}

impl Decodable for MessageHeader {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let header = Header::decode(buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString);
        }
        let started_len = buf.len();

        let kind = MessageKind::decode(buf)?;
        let poster = Address::decode(buf)?;
        let block_number = u64::decode(buf)?;
        let timestamp = u64::decode(buf)?;
        let request_id = if buf.first() == Some(&EMPTY_STRING_CODE) {
            *buf = &buf[1..];
            None
        } else {
            Some(B256::decode(buf)?)
        };
        let base_fee = U256::decode(buf)?;

        let consumed = started_len - buf.len();
        if consumed != header.payload_length {
            return Err(alloy_rlp::Error::ListLengthMismatch {
                expected: header.payload_length,
                got: consumed,
            });
        }

        Ok(Self { kind, poster, block_number, timestamp, request_id, base_fee })
    }
}

/// A canonical L2 message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, RlpEncodable, RlpDecodable)]
#[cfg_attr(any(test, feature = "arbitrary"), derive(arbitrary::Arbitrary))]
pub struct Message {
    /// The message header.
    pub header: MessageHeader,
    /// The kind specific payload.
    pub payload: Bytes,
}

impl Message {
    /// Returns a new [`Message`].
    pub const fn new(header: MessageHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Returns the RLP serialization of the message.
    pub fn serialize(&self) -> Vec<u8> {
        alloy_rlp::encode(self)
    }

    /// Returns the hash of the serialized message.
    pub fn hash(&self) -> B256 {
        keccak256(self.serialize())
    }

    /// Returns the message kind.
    pub const fn kind(&self) -> MessageKind {
        self.header.kind
    }
}

/// A message along with the count of delayed messages read once it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, RlpEncodable, RlpDecodable)]
#[cfg_attr(any(test, feature = "arbitrary"), derive(arbitrary::Arbitrary))]
pub struct MessageWithMetadata {
    /// The message.
    pub message: Message,
    /// The total count of delayed messages read after this message.
    pub delayed_messages_read: u64,
}

impl MessageWithMetadata {
    /// Returns a new [`MessageWithMetadata`].
    pub const fn new(message: Message, delayed_messages_read: u64) -> Self {
        Self { message, delayed_messages_read }
    }

    /// Returns the RLP serialization of the message with its metadata.
    pub fn serialize(&self) -> Vec<u8> {
        alloy_rlp::encode(self)
    }
}

/// The result of executing a message, as recorded on the consensus side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageResult {
    /// The hash of the block produced by the message.
    pub block_hash: B256,
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbitrary::Arbitrary;

    #[test]
    fn test_should_roundtrip_header_without_request_id() -> eyre::Result<()> {
        let header = MessageHeader {
            kind: MessageKind::L2Message,
            poster: Address::repeat_byte(0xaa),
            block_number: 12,
            timestamp: 1_700_000_000,
            request_id: None,
            base_fee: U256::from(7),
        };

        let encoded = alloy_rlp::encode(&header);
        let decoded = MessageHeader::decode(&mut encoded.as_slice())?;

        assert_eq!(decoded, header);
        assert_eq!(encoded.len(), header.length());

        Ok(())
    }

    #[test]
    fn test_should_distinguish_request_id() -> eyre::Result<()> {
        let mut bytes = [0u8; 1024];
        rand::RngCore::fill_bytes(&mut rand::rng(), &mut bytes);
        let mut u = arbitrary::Unstructured::new(&bytes);
        let mut message = Message::arbitrary(&mut u)?;

        message.header.request_id = None;
        let without = message.hash();
        message.header.request_id = Some(B256::ZERO);
        let with = message.hash();

        assert_ne!(without, with);
        assert_eq!(Message::decode(&mut message.serialize().as_slice())?, message);

        Ok(())
    }

    #[test]
    fn test_unknown_kind_is_invalid() {
        assert_eq!(MessageKind::from(0x42), MessageKind::Invalid);
        assert_eq!(MessageKind::from(9), MessageKind::SubmitRetryable);
    }
}
