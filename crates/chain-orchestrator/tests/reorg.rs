//! Tests for the reorg handling of the chain orchestrator.

use alloy_primitives::{Address, Bytes};
use rollup_chain_orchestrator::{
    ChainOrchestrator, ChainOrchestratorConfig, ChainOrchestratorError, ReorgError, Retry,
};
use rollup_codec::{BatchHeader, Segment, SequencerMessage};
use rollup_db::{InMemoryExtractionDb, MessageExtractionDb, MessageStore};
use rollup_engine::{
    test_utils::{append_messages, end_of_block, execute_all},
    EngineConfig, ExecutionEngine,
};
use rollup_extractor::{
    test_utils::{batch_event, MockParentChain},
    ExtractorConfig, StepOutcome,
};
use rollup_primitives::{fatal_error_channel, ConsensusFinality, FinalityData};
use rollup_sequencer::{Sequencer, SequencerConfig};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

const INBOX: Address = Address::repeat_byte(0x11);
const BRIDGE: Address = Address::repeat_byte(0x22);

type Orchestrator = ChainOrchestrator<Arc<MockParentChain>, Arc<InMemoryExtractionDb>>;

fn batch_data(tag: u8, count: u8) -> eyre::Result<Bytes> {
    let header = BatchHeader {
        min_timestamp: 0,
        max_timestamp: u64::MAX,
        min_block_number: 0,
        max_block_number: u64::MAX,
        after_delayed_messages: 0,
    };
    let segments: Vec<_> =
        (0..count).map(|i| Segment::L2Message(Bytes::from(vec![3, 0xc1, tag, i]))).collect();
    Ok(SequencerMessage::from_segments(header, segments).encode()?)
}

/// Posts a batch of two messages at each of the blocks 1, 2 and 3, followed by empty blocks up to
/// `head`.
fn chain_with_batches(head: u64) -> eyre::Result<Arc<MockParentChain>> {
    let chain = Arc::new(MockParentChain::new(0));
    for seq_num in 0..3 {
        chain.push_block(vec![batch_event(INBOX, seq_num, 0, batch_data(seq_num as u8, 2)?)]);
    }
    chain.push_empty_blocks(head.saturating_sub(3) as usize);
    Ok(chain)
}

fn orchestrator(
    chain: Arc<MockParentChain>,
    engine: Arc<ExecutionEngine>,
    config: ChainOrchestratorConfig,
) -> (Orchestrator, Arc<InMemoryExtractionDb>) {
    let db = Arc::new(InMemoryExtractionDb::new());
    let extractor_config = ExtractorConfig {
        parent_chain_id: 1,
        genesis_block_number: 0,
        sequencer_inbox: INBOX,
        bridge: BRIDGE,
    };
    let orchestrator =
        ChainOrchestrator::new(chain, db.clone(), engine, vec![], extractor_config, config);
    (orchestrator, db)
}

fn new_engine() -> Arc<ExecutionEngine> {
    Arc::new(ExecutionEngine::new(EngineConfig::default(), Arc::new(MessageStore::new())))
}

fn test_config() -> ChainOrchestratorConfig {
    ChainOrchestratorConfig {
        poll_interval: Duration::from_millis(10),
        retry: Retry::new(Some(3), 1, false),
        ..Default::default()
    }
}

async fn step_until_idle(orchestrator: &mut Orchestrator) -> Result<(), ChainOrchestratorError> {
    while orchestrator.step().await? != StepOutcome::Idle {}
    Ok(())
}

#[tokio::test]
async fn test_parent_chain_reorg_truncates_store_and_execution() -> eyre::Result<()> {
    // Given
    let chain = chain_with_batches(5)?;
    let engine = new_engine();
    let (mut orchestrator, db) = orchestrator(chain.clone(), engine.clone(), test_config());
    step_until_idle(&mut orchestrator).await?;
    assert_eq!(execute_all(&engine), 6);
    let dropped = engine.store().get(4).map(|m| m.message);

    // When
    chain.reorg_from(3);
    chain.push_block(vec![batch_event(INBOX, 2, 0, batch_data(0x42, 1)?)]);
    chain.push_empty_blocks(3);
    step_until_idle(&mut orchestrator).await?;

    // Then
    let store = engine.store();
    assert_eq!(store.count(), 5);
    assert_eq!(store.get(4).and_then(|m| m.origin).map(|o| o.number), Some(3));
    assert_eq!(engine.executed_count(), 4);
    assert_ne!(store.get(4).map(|m| m.message), dropped);
    assert_eq!(execute_all(&engine), 1);
    let executed = engine.result_at_message_index(4)?;
    assert_eq!(store.result(4), Some(executed));

    let head = db.head_state().await?.expect("head state");
    assert_eq!(head.parent_chain_block_number, 6);
    assert_eq!(head.parent_chain_block_hash, chain.header(6).expect("block 6").hash);
    assert_eq!(head.msg_count, 5);

    Ok(())
}

#[tokio::test]
async fn test_reorg_below_finalized_is_fatal() -> eyre::Result<()> {
    // Given
    let chain = chain_with_batches(5)?;
    let engine = new_engine();
    let (mut orchestrator, _) = orchestrator(chain.clone(), engine.clone(), test_config());
    step_until_idle(&mut orchestrator).await?;
    execute_all(&engine);
    let finalized = FinalityData::new(4, engine.result_at_message_index(4)?.block_hash);
    engine.set_finality_data(&ConsensusFinality {
        finalized: Some(finalized),
        ..Default::default()
    })?;

    // When
    chain.reorg_from(3);
    chain.push_empty_blocks(3);
    let res = step_until_idle(&mut orchestrator).await;

    // Then
    let Err(err) = res else { eyre::bail!("expected the reorg to fail") };
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        ChainOrchestratorError::Reorg(ReorgError::ReorgBelowFinalized { count: 4, finalized: 5 })
    ));
    assert_eq!(engine.store().count(), 6);
    assert_eq!(engine.executed_count(), 6);

    Ok(())
}

#[tokio::test]
async fn test_reorg_deeper_than_detection_depth_is_fatal() -> eyre::Result<()> {
    // Given
    let chain = chain_with_batches(8)?;
    let config = ChainOrchestratorConfig { reorg_detection_depth: 2, ..test_config() };
    let (mut orchestrator, _) = orchestrator(chain.clone(), new_engine(), config);
    step_until_idle(&mut orchestrator).await?;

    // When
    chain.reorg_from(2);
    chain.push_empty_blocks(8);
    let res = step_until_idle(&mut orchestrator).await;

    // Then
    let Err(ChainOrchestratorError::Reorg(err)) = res else {
        eyre::bail!("expected a reorg error, got {res:?}");
    };
    assert_eq!(err, ReorgError::ReorgTooDeep { from: 8, depth: 2 });
    assert!(err.is_fatal());

    Ok(())
}

#[tokio::test]
async fn test_divergence_replaces_sequenced_message() -> eyre::Result<()> {
    // Given
    let chain = Arc::new(MockParentChain::new(0));
    chain.push_empty_blocks(2);
    let engine = new_engine();
    append_messages(engine.store(), [end_of_block(7)]);
    assert_eq!(execute_all(&engine), 1);
    let (mut orchestrator, _) = orchestrator(chain.clone(), engine.clone(), test_config());
    step_until_idle(&mut orchestrator).await?;

    // When
    chain.push_block(vec![batch_event(INBOX, 0, 0, batch_data(1, 2)?)]);
    step_until_idle(&mut orchestrator).await?;

    // Then
    let store = engine.store();
    assert_eq!(store.count(), 2);
    assert_ne!(store.get(0).map(|m| m.message), Some(end_of_block(7)));
    assert_eq!(store.get(0).and_then(|m| m.origin).map(|o| o.number), Some(3));
    assert_eq!(engine.executed_count(), 0);
    assert_eq!(execute_all(&engine), 2);

    Ok(())
}

#[tokio::test]
async fn test_reorg_to_checkpoint_is_idempotent() -> eyre::Result<()> {
    // Given
    let chain = chain_with_batches(5)?;
    let engine = new_engine();
    let (mut orchestrator, db) = orchestrator(chain, engine.clone(), test_config());
    step_until_idle(&mut orchestrator).await?;
    execute_all(&engine);
    let checkpoint = db.state_at_block_number(2).await?.expect("state at block 2");

    // When
    let first = orchestrator.coordinator().reorg_to_checkpoint(checkpoint.clone()).await?;
    let generation = engine.store().reorg_generation();
    let second = orchestrator.coordinator().reorg_to_checkpoint(checkpoint.clone()).await?;

    // Then
    assert_eq!(first, checkpoint);
    assert_eq!(second, checkpoint);
    assert_eq!(engine.store().count(), 4);
    assert_eq!(engine.store().reorg_generation(), generation);
    assert_eq!(engine.executed_count(), 4);
    assert_eq!(db.head_state().await?, Some(checkpoint));

    Ok(())
}

#[tokio::test]
async fn test_spawned_orchestrator_follows_new_blocks() -> eyre::Result<()> {
    // Given
    let chain = chain_with_batches(3)?;
    let engine = new_engine();
    let sequencer = Arc::new(Sequencer::new(engine.store().clone(), SequencerConfig::default()));
    let (orchestrator, _) = orchestrator(chain.clone(), engine.clone(), test_config());
    let (fatal, mut fatal_rx) = fatal_error_channel();
    let cancel = CancellationToken::new();
    let task = orchestrator.with_sequencer(sequencer.clone()).spawn(cancel.clone(), fatal);
    let mut count = engine.store().subscribe();
    tokio::time::timeout(Duration::from_secs(5), count.wait_for(|count| *count == 6)).await??;

    // When
    chain.push_block(vec![batch_event(INBOX, 3, 0, batch_data(3, 3)?)]);

    // Then
    tokio::time::timeout(Duration::from_secs(5), count.wait_for(|count| *count == 9)).await??;
    assert_eq!(engine.store().get(8).and_then(|m| m.origin).map(|o| o.number), Some(4));
    tokio::time::timeout(Duration::from_secs(5), async {
        while sequencer.parent_chain_block_number() < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;

    cancel.cancel();
    task.await?;
    assert!(fatal_rx.try_recv().is_none());

    Ok(())
}

#[tokio::test]
async fn test_spawned_orchestrator_reports_fatal_errors() -> eyre::Result<()> {
    // Given
    let chain = chain_with_batches(8)?;
    let config = ChainOrchestratorConfig { reorg_detection_depth: 1, ..test_config() };
    let engine = new_engine();
    let (orchestrator, _) = orchestrator(chain.clone(), engine.clone(), config);
    let (fatal, mut fatal_rx) = fatal_error_channel();
    let task = orchestrator.spawn(CancellationToken::new(), fatal);
    let mut count = engine.store().subscribe();
    tokio::time::timeout(Duration::from_secs(5), count.wait_for(|count| *count == 6)).await??;

    // When
    chain.reorg_from(1);
    chain.push_empty_blocks(9);

    // Then
    tokio::time::timeout(Duration::from_secs(5), task).await??;
    let error = fatal_rx.try_recv().expect("fatal error reported");
    assert_eq!(error.component, "orchestrator");

    Ok(())
}
