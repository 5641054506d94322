//! Test utilities for the engine crate.

use crate::{EngineConfig, ExecutionEngine, ExecutionOutcome};
use alloy_primitives::{Address, Bytes, B256, U256};
use rollup_codec::encode_l2_transactions;
use rollup_db::MessageStore;
use rollup_primitives::{
    L2Transaction, Message, MessageHeader, MessageKind, MessageWithMetadata, BATCH_POSTER_ADDRESS,
};
use rollup_retryables::SubmitRetryable;
use std::sync::Arc;

/// The account posting the delayed messages built by the helpers.
pub const DELAYED_POSTER: Address = Address::repeat_byte(0xde);

fn message(
    kind: MessageKind,
    poster: Address,
    timestamp: u64,
    request_id: Option<B256>,
    payload: Bytes,
) -> Message {
    Message::new(
        MessageHeader { kind, poster, block_number: 1, timestamp, request_id, base_fee: U256::ZERO },
        payload,
    )
}

/// Returns an L2 message carrying the transactions.
pub fn l2_message(timestamp: u64, transactions: &[L2Transaction]) -> MessageWithMetadata {
    let message = message(
        MessageKind::L2Message,
        BATCH_POSTER_ADDRESS,
        timestamp,
        None,
        encode_l2_transactions(transactions),
    );
    MessageWithMetadata::new(message, 0)
}

/// Returns a deposit of `value` to `to`, identified by the sequence number.
pub fn deposit(seq_num: u8, to: Address, value: U256) -> MessageWithMetadata {
    let mut payload = to.to_vec();
    payload.extend_from_slice(&value.to_be_bytes::<32>());
    let message = message(
        MessageKind::EthDeposit,
        DELAYED_POSTER,
        u64::from(seq_num),
        Some(B256::with_last_byte(seq_num)),
        payload.into(),
    );
    MessageWithMetadata::new(message, u64::from(seq_num) + 1)
}

/// Returns the submission of a retryable ticket, identified by the request id.
pub fn submit_retryable(
    request_id: B256,
    timestamp: u64,
    submission: &SubmitRetryable,
) -> MessageWithMetadata {
    let message = message(
        MessageKind::SubmitRetryable,
        DELAYED_POSTER,
        timestamp,
        Some(request_id),
        submission.encode(),
    );
    MessageWithMetadata::new(message, 0)
}

/// Returns a message producing an empty block.
pub fn end_of_block(timestamp: u64) -> MessageWithMetadata {
    MessageWithMetadata::new(
        message(MessageKind::EndOfBlock, BATCH_POSTER_ADDRESS, timestamp, None, Bytes::new()),
        0,
    )
}

/// Appends the messages to the store, following its head.
pub fn append_messages(
    store: &MessageStore,
    messages: impl IntoIterator<Item = MessageWithMetadata>,
) {
    for message in messages {
        let index = store.count();
        store.append(index, message).expect("message follows the store head");
    }
}

/// Executes every message of the store.
pub fn execute_all(engine: &ExecutionEngine) -> u64 {
    let mut executed = 0;
    while let ExecutionOutcome::Executed(_) =
        engine.execute_next_message().expect("message executes")
    {
        executed += 1;
    }
    executed
}

/// Returns an engine that executed `count` empty blocks.
pub fn engine_with_blocks(config: EngineConfig, count: u64) -> Arc<ExecutionEngine> {
    let store = Arc::new(MessageStore::new());
    append_messages(&store, (0..count).map(end_of_block));
    let engine = Arc::new(ExecutionEngine::new(config, store));
    execute_all(&engine);
    engine
}
