//! Turns sequencer batches into canonical messages.

use crate::{
    error::ExtractorResult, DataAvailabilityReader, ExtractorError, MalformedMessageError,
};
use alloy_primitives::{Bytes, U256};
use rollup_codec::{
    compression::decompress, flags::requires_data_availability_reader, BatchHeader, Segment,
    SequencerMessage, MAX_L2_MESSAGE_SIZE,
};
use rollup_db::MessageExtractionDb;
use rollup_primitives::{
    DelayedInboxMessage, Message, MessageHeader, MessageKind, MessageWithMetadata,
    SequencerBatch, BATCH_POSTER_ADDRESS,
};
use std::sync::Arc;

/// Decodes the batch, resolving its payload through the data availability readers if needed.
pub(crate) async fn resolve_batch(
    batch: &SequencerBatch,
    delayed_messages_seen: u64,
    da_readers: &[Arc<dyn DataAvailabilityReader>],
) -> ExtractorResult<SequencerMessage> {
    let (header, payload) = BatchHeader::split(&batch.data).map_err(MalformedMessageError::from)?;
    if header.after_delayed_messages != batch.after_delayed_count {
        return Err(MalformedMessageError::AfterDelayedMismatch {
            seq_num: batch.seq_num,
            header: header.after_delayed_messages,
            event: batch.after_delayed_count,
        }
        .into());
    }
    if header.after_delayed_messages > delayed_messages_seen {
        return Err(MalformedMessageError::AfterDelayedExceedsSeen {
            seq_num: batch.seq_num,
            after_delayed: header.after_delayed_messages,
            seen: delayed_messages_seen,
        }
        .into());
    }

    let message = match payload.first() {
        Some(&flag) if requires_data_availability_reader(flag) => {
            let reader = da_readers
                .iter()
                .find(|reader| reader.is_valid_header_byte(flag))
                .ok_or(MalformedMessageError::NoDataAvailabilityReader(flag))?;
            let resolved = reader.fetch_batch_data(batch.seq_num, payload).await?;
            tracing::trace!(target: "rollup::extractor", seq_num = batch.seq_num, flag, len = resolved.len(), "resolved batch payload");

            let mut data = header.encode().to_vec();
            data.extend_from_slice(&resolved);
            SequencerMessage::decode(&data)
        }
        _ => SequencerMessage::decode(&batch.data),
    };

    Ok(message.map_err(MalformedMessageError::from)?)
}

/// Looks up delayed messages by sequence number, from the block being folded or the database.
#[derive(Debug)]
pub(crate) struct DelayedMessageLookup<'a, DB> {
    db: &'a DB,
    first_new: u64,
    new: &'a [DelayedInboxMessage],
}

impl<'a, DB: MessageExtractionDb> DelayedMessageLookup<'a, DB> {
    /// Returns a new lookup. `new` holds the delayed messages seen in the current block,
    /// starting at sequence number `first_new`.
    pub(crate) const fn new(db: &'a DB, first_new: u64, new: &'a [DelayedInboxMessage]) -> Self {
        Self { db, first_new, new }
    }

    async fn message(&self, seq_num: u64) -> ExtractorResult<Message> {
        if seq_num >= self.first_new {
            return self
                .new
                .get((seq_num - self.first_new) as usize)
                .map(|delayed| delayed.message.clone())
                .ok_or(ExtractorError::MissingDelayedMessage(seq_num));
        }
        self.db
            .delayed_message(seq_num)
            .await?
            .map(|delayed| delayed.message)
            .ok_or(ExtractorError::MissingDelayedMessage(seq_num))
    }
}

/// The messages of a batch and the delayed message count read once it is applied.
#[derive(Debug)]
pub(crate) struct BatchMessages {
    pub(crate) messages: Vec<MessageWithMetadata>,
    pub(crate) delayed_messages_read: u64,
}

/// Walks the segments of the batch and returns the messages it produces.
///
/// Every segment that carries content produces exactly one message, so message indices do not
/// depend on the validity of the content.
pub(crate) async fn messages_from_batch<DB: MessageExtractionDb>(
    batch: &SequencerMessage,
    delayed_messages_read: u64,
    lookup: &DelayedMessageLookup<'_, DB>,
) -> ExtractorResult<BatchMessages> {
    let header = batch.header;
    let after_delayed = header.after_delayed_messages;
    let mut delayed_read = delayed_messages_read;
    let mut timestamp = 0u64;
    let mut block_number = 0u64;
    let mut messages = Vec::new();

    for segment in batch.parsed_segments() {
        let body = match segment {
            Segment::AdvanceTimestamp(delta) => {
                timestamp = timestamp.saturating_add(delta);
                continue
            }
            Segment::AdvanceBlockNumber(delta) => {
                block_number = block_number.saturating_add(delta);
                continue
            }
            Segment::MalformedAdvance => continue,
            Segment::DelayedMessages => {
                if delayed_read >= after_delayed {
                    tracing::warn!(target: "rollup::extractor", delayed_read, after_delayed, "attempt to read past batch delayed message count");
                    None
                } else {
                    let message = lookup.message(delayed_read).await?;
                    delayed_read += 1;
                    messages.push(MessageWithMetadata::new(message, delayed_read));
                    continue
                }
            }
            Segment::L2Message(body) => Some(body),
            Segment::L2MessageCompressed(compressed) => {
                match decompress(&compressed, MAX_L2_MESSAGE_SIZE) {
                    Ok(body) => Some(Bytes::from(body)),
                    Err(err) => {
                        tracing::warn!(target: "rollup::extractor", ?err, "failed to decompress l2 message segment");
                        None
                    }
                }
            }
            Segment::Empty => {
                tracing::warn!(target: "rollup::extractor", "empty batch segment");
                None
            }
            Segment::Unknown(kind) => {
                tracing::warn!(target: "rollup::extractor", kind, "unknown batch segment kind");
                None
            }
        };

        let message = sequenced_message(&header, timestamp, block_number, body);
        messages.push(MessageWithMetadata::new(message, delayed_read));
    }

    // read the remaining delayed messages through virtual segments.
    while delayed_read < after_delayed {
        let message = lookup.message(delayed_read).await?;
        delayed_read += 1;
        messages.push(MessageWithMetadata::new(message, delayed_read));
    }

    Ok(BatchMessages { messages, delayed_messages_read: delayed_read })
}

/// Returns the message for an L2 message segment. A `None` body produces an invalid message.
fn sequenced_message(
    header: &BatchHeader,
    timestamp: u64,
    block_number: u64,
    body: Option<Bytes>,
) -> Message {
    let (kind, payload) = match body {
        Some(body) => (MessageKind::L2Message, body),
        None => (MessageKind::Invalid, Bytes::new()),
    };
    Message::new(
        MessageHeader {
            kind,
            poster: BATCH_POSTER_ADDRESS,
            block_number: header.clamp_block_number(block_number),
            timestamp: header.clamp_timestamp(timestamp),
            request_id: None,
            base_fee: U256::ZERO,
        },
        payload,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use rollup_codec::compression::compress;
    use rollup_db::InMemoryExtractionDb;

    fn header(after_delayed_messages: u64) -> BatchHeader {
        BatchHeader {
            min_timestamp: 1_000,
            max_timestamp: 2_000,
            min_block_number: 10,
            max_block_number: 20,
            after_delayed_messages,
        }
    }

    fn delayed(seq_num: u64) -> DelayedInboxMessage {
        let message = Message::new(
            MessageHeader {
                kind: MessageKind::EthDeposit,
                poster: BATCH_POSTER_ADDRESS,
                block_number: 5,
                timestamp: 900,
                request_id: Some(B256::with_last_byte(seq_num as u8)),
                base_fee: U256::ZERO,
            },
            Bytes::new(),
        );
        DelayedInboxMessage { seq_num, before_inbox_acc: B256::ZERO, message }
    }

    #[tokio::test]
    async fn test_should_clamp_and_emit_invalid_messages() -> eyre::Result<()> {
        // Given
        let db = InMemoryExtractionDb::new();
        let new = [delayed(0)];
        let lookup = DelayedMessageLookup::new(&db, 0, &new);
        let batch = SequencerMessage::from_segments(
            header(1),
            [
                Segment::AdvanceTimestamp(1_500),
                Segment::AdvanceBlockNumber(100),
                Segment::L2Message(Bytes::from_static(&[3, 0xc0])),
                Segment::Unknown(9),
                Segment::DelayedMessages,
                Segment::DelayedMessages,
                Segment::L2MessageCompressed(Bytes::from(compress(&[3, 0xc0])?)),
            ],
        );

        // When
        let out = messages_from_batch(&batch, 0, &lookup).await?;

        // Then
        let kinds: Vec<_> = out.messages.iter().map(|m| m.message.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::L2Message,
                MessageKind::Invalid,
                MessageKind::EthDeposit,
                MessageKind::Invalid,
                MessageKind::L2Message,
            ]
        );
        assert_eq!(out.messages[0].message.header.timestamp, 1_500);
        assert_eq!(out.messages[0].message.header.block_number, 20);
        assert_eq!(out.messages[0].delayed_messages_read, 0);
        assert_eq!(out.messages[2].delayed_messages_read, 1);
        assert_eq!(out.messages[4].message.payload, Bytes::from_static(&[3, 0xc0]));
        assert_eq!(out.delayed_messages_read, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_read_remaining_delayed_messages() -> eyre::Result<()> {
        let db = InMemoryExtractionDb::new();
        let new = [delayed(0), delayed(1), delayed(2)];
        let lookup = DelayedMessageLookup::new(&db, 0, &new);
        let batch = SequencerMessage::from_segments(header(3), Vec::new());

        let out = messages_from_batch(&batch, 1, &lookup).await?;

        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].message, new[1].message);
        assert_eq!(out.messages[1].delayed_messages_read, 3);
        assert_eq!(out.delayed_messages_read, 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_reject_batch_reading_unseen_delayed_messages() -> eyre::Result<()> {
        let data = SequencerMessage::from_segments(header(4), Vec::new()).encode()?;
        let batch = SequencerBatch { seq_num: 0, after_delayed_count: 4, data };

        let res = resolve_batch(&batch, 3, &[]).await;

        assert!(matches!(
            res,
            Err(ExtractorError::MalformedMessage(MalformedMessageError::AfterDelayedExceedsSeen {
                after_delayed: 4,
                seen: 3,
                ..
            }))
        ));

        Ok(())
    }
}
