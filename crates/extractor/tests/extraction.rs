//! Tests for the message extraction from an in-memory parent chain.

use alloy_primitives::{Address, Bytes, B256, U256};
use rollup_codec::{flags::DAS_MESSAGE_HEADER_FLAG, BatchHeader, Segment, SequencerMessage};
use rollup_db::{InMemoryExtractionDb, MessageExtractionDb, MessageStore};
use rollup_extractor::{
    test_utils::{batch_event, DelayedInboxBuilder, MockDataAvailability, MockParentChain},
    walk_forwards, DataAvailabilityReader, Extractor, ExtractorConfig, ExtractorError,
    ExtractorState, MalformedMessageError, ReorgTrigger, StepOutcome,
};
use rollup_primitives::{
    DelayedInboxMessage, DerivationState, Message, MessageHeader, MessageKind, ParentChainEvent,
    ParentChainEventKind,
};
use std::sync::Arc;

const INBOX: Address = Address::repeat_byte(0x11);
const BRIDGE: Address = Address::repeat_byte(0x22);

fn deposit(n: u8) -> Message {
    Message::new(
        MessageHeader {
            kind: MessageKind::EthDeposit,
            poster: Address::repeat_byte(n),
            block_number: 1,
            timestamp: 12,
            request_id: Some(B256::with_last_byte(n)),
            base_fee: U256::from(1),
        },
        Bytes::from(vec![n; 52]),
    )
}

fn batch_data(after_delayed: u64, segments: Vec<Segment>) -> eyre::Result<Bytes> {
    let header = BatchHeader {
        min_timestamp: 0,
        max_timestamp: u64::MAX,
        min_block_number: 0,
        max_block_number: u64::MAX,
        after_delayed_messages: after_delayed,
    };
    Ok(SequencerMessage::from_segments(header, segments).encode()?)
}

fn l2_segments(count: u8) -> Vec<Segment> {
    (0..count).map(|i| Segment::L2Message(Bytes::from(vec![3, 0xc1, i]))).collect()
}

fn initial_state(chain: &MockParentChain) -> DerivationState {
    let anchor = chain.header(0).expect("anchor block");
    DerivationState::initial(1, &anchor, INBOX, BRIDGE)
}

fn config() -> ExtractorConfig {
    ExtractorConfig { parent_chain_id: 1, genesis_block_number: 0, sequencer_inbox: INBOX, bridge: BRIDGE }
}

/// Builds a chain of 20 blocks with two deposits at block 3 and a batch at block 5 that reads the
/// first deposit between three L2 messages.
fn populated_chain() -> eyre::Result<MockParentChain> {
    let chain = MockParentChain::new(0);
    let mut inbox = DelayedInboxBuilder::new(BRIDGE);

    chain.push_empty_blocks(2);
    chain.push_block(vec![inbox.add(deposit(1)), inbox.add(deposit(2))]);
    chain.push_empty_blocks(1);
    let mut segments = l2_segments(2);
    segments.insert(1, Segment::DelayedMessages);
    chain.push_block(vec![batch_event(INBOX, 0, 1, batch_data(1, segments)?)]);
    chain.push_empty_blocks(14);

    Ok(chain)
}

#[tokio::test]
async fn test_walk_forwards_is_deterministic() -> eyre::Result<()> {
    // Given
    let chain = populated_chain()?;
    let state = initial_state(&chain);

    // When
    let (db_a, db_b) = (InMemoryExtractionDb::new(), InMemoryExtractionDb::new());
    let (state_a, messages_a) = walk_forwards(&state, &chain, &db_a, &[], 19).await?;
    let (state_b, messages_b) = walk_forwards(&state, &chain, &db_b, &[], 19).await?;

    // Then
    assert_eq!(state_a, state_b);
    assert_eq!(messages_a, messages_b);
    assert_eq!(state_a.msg_count, 3);
    assert_eq!(state_a.next_batch_seq_num, 1);
    assert_eq!(state_a.next_delayed_message_seq_num, 2);
    assert_eq!(state_a.delayed_messages_read, 1);
    assert_eq!(messages_a[1].message, deposit(1));
    assert_eq!(messages_a[1].delayed_messages_read, 1);
    assert_eq!(db_a.messages(0..3).await?, messages_a);
    assert_eq!(db_a.delayed_message(1).await?.map(|d| d.message), Some(deposit(2)));

    Ok(())
}

#[tokio::test]
async fn test_should_reject_out_of_sequence_batch() -> eyre::Result<()> {
    // Given
    let chain = MockParentChain::new(0);
    chain.push_block(vec![batch_event(INBOX, 1, 0, batch_data(0, l2_segments(1))?)]);
    let db = InMemoryExtractionDb::new();

    // When
    let res = walk_forwards(&initial_state(&chain), &chain, &db, &[], 1).await;

    // Then
    let err = res.expect_err("batch 1 posted before batch 0");
    assert!(err.is_fatal());
    assert!(db.head_state().await?.is_none());

    Ok(())
}

/// Builds a chain whose block 1 adds a deposit read by batch 0, followed by a block 2 holding the
/// events returned by `tail`.
fn chain_with_tail(
    tail: impl FnOnce(&mut DelayedInboxBuilder) -> eyre::Result<Vec<ParentChainEvent>>,
) -> eyre::Result<MockParentChain> {
    let chain = MockParentChain::new(0);
    let mut inbox = DelayedInboxBuilder::new(BRIDGE);
    chain.push_block(vec![
        inbox.add(deposit(1)),
        batch_event(INBOX, 0, 1, batch_data(1, vec![Segment::DelayedMessages])?),
    ]);
    let events = tail(&mut inbox)?;
    chain.push_block(events);
    Ok(chain)
}

/// Extracts block 1, then asserts that extracting block 2 fails and leaves the committed head
/// untouched.
async fn extract_rejected_tail(chain: &MockParentChain) -> eyre::Result<ExtractorError> {
    let db = InMemoryExtractionDb::new();
    let (state, _) = walk_forwards(&initial_state(chain), chain, &db, &[], 1).await?;
    let head = db.head_state().await?;
    assert_eq!(head.as_ref(), Some(&state));

    let err = walk_forwards(&state, chain, &db, &[], 2).await.expect_err("block 2 is malformed");

    assert_eq!(db.head_state().await?, head);
    assert_eq!(db.messages(0..1).await?.len(), 1);
    Ok(err)
}

#[tokio::test]
async fn test_should_reject_delayed_message_with_wrong_accumulator() -> eyre::Result<()> {
    // Given
    let chain = chain_with_tail(|_| {
        let delayed =
            DelayedInboxMessage { seq_num: 1, before_inbox_acc: B256::ZERO, message: deposit(2) };
        Ok(vec![ParentChainEvent {
            address: BRIDGE,
            kind: ParentChainEventKind::DelayedMessageAdded(delayed),
        }])
    })?;

    // When
    let err = extract_rejected_tail(&chain).await?;

    // Then
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        ExtractorError::MalformedMessage(MalformedMessageError::DelayedAccumulatorMismatch {
            seq_num: 1,
            expected,
            got,
        }) if got.is_zero() && !expected.is_zero()
    ));

    Ok(())
}

#[tokio::test]
async fn test_should_reject_skipped_delayed_message() -> eyre::Result<()> {
    // Given
    let chain = chain_with_tail(|inbox| {
        let _skipped = inbox.add(deposit(2));
        Ok(vec![inbox.add(deposit(3))])
    })?;

    // When
    let err = extract_rejected_tail(&chain).await?;

    // Then
    assert!(matches!(
        err,
        ExtractorError::MalformedMessage(MalformedMessageError::DelayedSequenceMismatch {
            expected: 1,
            got: 2,
        })
    ));

    Ok(())
}

#[tokio::test]
async fn test_should_reject_batch_header_disagreeing_with_event() -> eyre::Result<()> {
    // Given
    let chain = chain_with_tail(|inbox| {
        Ok(vec![inbox.add(deposit(2)), batch_event(INBOX, 1, 2, batch_data(1, l2_segments(1))?)])
    })?;

    // When
    let err = extract_rejected_tail(&chain).await?;

    // Then
    assert!(matches!(
        err,
        ExtractorError::MalformedMessage(MalformedMessageError::AfterDelayedMismatch {
            seq_num: 1,
            header: 1,
            event: 2,
        })
    ));

    Ok(())
}

#[tokio::test]
async fn test_should_resolve_batches_through_data_availability() -> eyre::Result<()> {
    // Given
    let chain = MockParentChain::new(0);
    let das = Arc::new(MockDataAvailability::new(DAS_MESSAGE_HEADER_FLAG));
    let inline = batch_data(0, l2_segments(2))?;
    let certificate = das.store(inline.slice(40..));
    let mut data = inline[..40].to_vec();
    data.extend_from_slice(&certificate);
    chain.push_block(vec![batch_event(INBOX, 0, 0, data.into())]);
    let readers: Vec<Arc<dyn DataAvailabilityReader>> = vec![das.clone()];
    let db = InMemoryExtractionDb::new();
    let state = initial_state(&chain);

    // When
    das.set_unavailable(true);
    let unavailable = walk_forwards(&state, &chain, &db, &readers, 1).await;
    das.set_unavailable(false);
    let (state, messages) = walk_forwards(&state, &chain, &db, &readers, 1).await?;

    // Then
    assert!(matches!(unavailable, Err(ExtractorError::DataUnavailable(_))));
    assert_eq!(messages.len(), 2);
    assert_eq!(state.msg_count, 2);

    // without a reader, the flag is a protocol violation.
    let res = walk_forwards(&initial_state(&chain), &chain, &InMemoryExtractionDb::new(), &[], 1).await;
    assert!(res.is_err_and(|err| err.is_fatal()));

    Ok(())
}

#[tokio::test]
async fn test_extractor_commits_blocks_into_store() -> eyre::Result<()> {
    // Given
    let chain = Arc::new(populated_chain()?);
    let db = Arc::new(InMemoryExtractionDb::new());
    let store = Arc::new(MessageStore::new());
    let mut extractor = Extractor::new(chain.clone(), db.clone(), store.clone(), vec![], config());

    // When
    while extractor.step().await? != StepOutcome::Idle {}

    // Then
    assert_eq!(store.count(), 3);
    let origin = store.get(0).and_then(|m| m.origin).expect("origin recorded");
    assert_eq!(origin.number, 5);
    assert_eq!(origin.hash, chain.header(5).expect("block 5").hash);
    assert!(matches!(extractor.state(), ExtractorState::ProcessingNextBlock(s) if s.parent_chain_block_number == 19));

    Ok(())
}

#[tokio::test]
async fn test_extractor_detects_parent_chain_reorg() -> eyre::Result<()> {
    // Given
    let chain = Arc::new(populated_chain()?);
    let db = Arc::new(InMemoryExtractionDb::new());
    let store = Arc::new(MessageStore::new());
    let mut extractor = Extractor::new(chain.clone(), db.clone(), store.clone(), vec![], config());
    while extractor.step().await? != StepOutcome::Idle {}

    // When
    chain.reorg_from(18);
    chain.push_empty_blocks(3);
    let mut outcome = extractor.step().await?;
    while outcome == StepOutcome::Progressed {
        outcome = extractor.step().await?;
    }

    // Then
    let StepOutcome::ReorgRequired(ReorgTrigger::ParentChain(state)) = outcome else {
        eyre::bail!("expected a parent chain reorg, got {outcome:?}");
    };
    assert_eq!(state.parent_chain_block_number, 19);
    assert_eq!(extractor.step().await?, StepOutcome::ReorgRequired(ReorgTrigger::ParentChain(state)));

    // resuming from the common ancestor follows the new chain.
    let checkpoint = db.state_at_block_number(17).await?.expect("state at 17");
    db.rewind_to(&checkpoint).await?;
    extractor.reset_to(checkpoint);
    while extractor.step().await? != StepOutcome::Idle {}
    let head = db.head_state().await?.expect("head state");
    assert_eq!(head.parent_chain_block_number, 20);
    assert_eq!(head.parent_chain_block_hash, chain.header(20).expect("block 20").hash);

    Ok(())
}

#[tokio::test]
async fn test_extractor_reconciles_store_on_start() -> eyre::Result<()> {
    // Given
    let chain = Arc::new(populated_chain()?);
    let db = Arc::new(InMemoryExtractionDb::new());
    let mut extractor =
        Extractor::new(chain.clone(), db.clone(), Arc::new(MessageStore::new()), vec![], config());
    while extractor.step().await? != StepOutcome::Idle {}

    // When
    let store = Arc::new(MessageStore::new());
    let mut restarted = Extractor::new(chain.clone(), db.clone(), store.clone(), vec![], config());
    restarted.step().await?;

    // Then
    assert_eq!(store.count(), 3);
    assert_eq!(store.get(2).and_then(|m| m.origin).map(|o| o.number), Some(5));
    assert!(matches!(restarted.state(), ExtractorState::ProcessingNextBlock(s) if s.parent_chain_block_number == 19));

    Ok(())
}
