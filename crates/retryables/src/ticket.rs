use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rlp::{Decodable, Encodable, RlpDecodable, RlpEncodable};

/// The lifecycle status of a retryable ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[repr(u8)]
pub enum RetryableStatus {
    /// The ticket was created without scheduling an auto-redeem.
    Submitted = 0,
    /// The auto-redeem succeeded and the ticket was deleted.
    AutoRedeemSucceeded = 1,
    /// The auto-redeem failed. The ticket can be redeemed manually until its deadline.
    AutoRedeemFailed = 2,
    /// A manual redeem succeeded and the ticket was deleted.
    ManuallyRedeemed = 3,
    /// A manual redeem failed.
    RedeemFailed = 4,
    /// The ticket expired before being redeemed.
    Expired = 5,
}

impl RetryableStatus {
    /// Returns `true` if a ticket in this status has been deleted.
    pub const fn is_deleted(&self) -> bool {
        matches!(self, Self::AutoRedeemSucceeded | Self::ManuallyRedeemed | Self::Expired)
    }
}

impl TryFrom<u8> for RetryableStatus {
    type Error = alloy_rlp::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Submitted,
            1 => Self::AutoRedeemSucceeded,
            2 => Self::AutoRedeemFailed,
            3 => Self::ManuallyRedeemed,
            4 => Self::RedeemFailed,
            5 => Self::Expired,
            _ => return Err(alloy_rlp::Error::Custom("unknown retryable status")),
        })
    }
}

impl Encodable for RetryableStatus {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        (*self as u8).encode(out)
    }

    fn length(&self) -> usize {
        (*self as u8).length()
    }
}

impl Decodable for RetryableStatus {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        u8::decode(buf)?.try_into()
    }
}

/// A retryable ticket.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct RetryableTicket {
    /// The ticket id, derived from the submitting message.
    pub id: B256,
    /// The account that submitted the ticket.
    pub from: Address,
    /// The call destination. The zero address denotes a contract creation.
    pub to: Address,
    /// The value escrowed for the call.
    pub callvalue: U256,
    /// The address receiving the escrowed value if the ticket expires.
    pub beneficiary: Address,
    /// The address receiving the excess fees.
    pub fee_refund_address: Address,
    /// The calldata.
    pub calldata: Bytes,
    /// The timestamp after which the ticket expires.
    pub deadline: u64,
    /// The number of redeem attempts.
    pub num_tries: u64,
    /// The ticket status.
    pub status: RetryableStatus,
}

impl RetryableTicket {
    /// Returns `true` if the ticket is expired at the timestamp.
    pub const fn is_expired_at(&self, timestamp: u64) -> bool {
        self.deadline < timestamp
    }
}

/// An event emitted by a retryable ticket state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryableEvent {
    /// A ticket was created.
    TicketCreated {
        /// The ticket id.
        id: B256,
    },
    /// A redeem attempt was scheduled.
    RedeemScheduled {
        /// The ticket id.
        id: B256,
        /// The number of attempts, including the scheduled one.
        num_tries: u64,
        /// The gas provided to the attempt.
        gas: u64,
    },
    /// A redeem attempt succeeded and the ticket was deleted.
    RedeemSucceeded {
        /// The ticket id.
        id: B256,
        /// The call destination.
        to: Address,
        /// The value transferred from the escrow.
        value: U256,
    },
    /// A redeem attempt failed.
    RedeemFailed {
        /// The ticket id.
        id: B256,
        /// The number of attempts so far.
        num_tries: u64,
        /// The failure reason.
        reason: String,
    },
    /// A ticket expired and was deleted.
    Expired {
        /// The ticket id.
        id: B256,
        /// The address receiving the escrowed value.
        beneficiary: Address,
        /// The escrowed value.
        value: U256,
    },
}

impl RetryableEvent {
    /// Returns the id of the ticket the event relates to.
    pub const fn id(&self) -> B256 {
        match self {
            Self::TicketCreated { id } |
            Self::RedeemScheduled { id, .. } |
            Self::RedeemSucceeded { id, .. } |
            Self::RedeemFailed { id, .. } |
            Self::Expired { id, .. } => *id,
        }
    }
}

/// The outcome of a submission or redeem, recorded in the block receipts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryableReceipt {
    /// The ticket id.
    pub id: B256,
    /// The ticket status after the operation.
    pub status: RetryableStatus,
    /// The emitted events.
    pub events: Vec<RetryableEvent>,
}
