//! Finality across extraction, execution and rollbacks.

use alloy_primitives::{Address, Bytes};
use rollup_chain_orchestrator::{ChainOrchestrator, ChainOrchestratorConfig, ReorgError};
use rollup_codec::{BatchHeader, Segment, SequencerMessage};
use rollup_db::{InMemoryExtractionDb, MessageExtractionDb, MessageStore};
use rollup_engine::{
    test_utils::execute_all, EngineConfig, EngineError, ExecutionEngine, FinalityTier,
};
use rollup_extractor::{
    test_utils::{batch_event, MockParentChain},
    ExtractorConfig, StepOutcome,
};
use rollup_primitives::{ConsensusFinality, FinalityData};
use std::sync::Arc;

const INBOX: Address = Address::repeat_byte(0x11);
const BRIDGE: Address = Address::repeat_byte(0x22);
const GENESIS_BLOCK_NUMBER: u64 = 1_000;

fn batch_data(seq_num: u8) -> eyre::Result<Bytes> {
    let header = BatchHeader {
        min_timestamp: 0,
        max_timestamp: u64::MAX,
        min_block_number: 0,
        max_block_number: u64::MAX,
        after_delayed_messages: 0,
    };
    let segments: Vec<_> =
        (0..3).map(|i| Segment::L2Message(Bytes::from(vec![3, 0xc1, seq_num, i]))).collect();
    Ok(SequencerMessage::from_segments(header, segments).encode()?)
}

/// Extracts 20 parent chain blocks carrying five batches of three messages and executes them.
async fn extracted_and_executed() -> eyre::Result<(
    ChainOrchestrator<Arc<MockParentChain>, Arc<InMemoryExtractionDb>>,
    Arc<InMemoryExtractionDb>,
    Arc<ExecutionEngine>,
)> {
    let chain = Arc::new(MockParentChain::new(0));
    for seq_num in 0..5 {
        chain.push_empty_blocks(2);
        chain.push_block(vec![batch_event(INBOX, seq_num, 0, batch_data(seq_num as u8)?)]);
    }
    chain.push_empty_blocks(4);
    assert!(chain.header(19).is_some());

    let config = EngineConfig { genesis_block_number: GENESIS_BLOCK_NUMBER, ..Default::default() };
    let engine = Arc::new(ExecutionEngine::new(config, Arc::new(MessageStore::new())));
    let db = Arc::new(InMemoryExtractionDb::new());
    let extractor_config = ExtractorConfig {
        parent_chain_id: 1,
        genesis_block_number: 0,
        sequencer_inbox: INBOX,
        bridge: BRIDGE,
    };
    let mut orchestrator = ChainOrchestrator::new(
        chain,
        db.clone(),
        engine.clone(),
        vec![],
        extractor_config,
        ChainOrchestratorConfig::default(),
    );
    while orchestrator.step().await? != StepOutcome::Idle {}
    assert_eq!(execute_all(&engine), 15);

    Ok((orchestrator, db, engine))
}

fn finality_data(engine: &ExecutionEngine, index: u64) -> eyre::Result<FinalityData> {
    Ok(FinalityData::new(index, engine.result_at_message_index(index)?.block_hash))
}

#[tokio::test]
async fn test_rollback_below_finality_clears_tiers() -> eyre::Result<()> {
    // Given
    let (orchestrator, _, engine) = extracted_and_executed().await?;
    let finality = ConsensusFinality {
        safe: Some(finality_data(&engine, 14)?),
        finalized: Some(finality_data(&engine, 9)?),
        validated: None,
    };
    engine.set_finality_data(&finality)?;
    assert_eq!(engine.finalized_block()?.number, engine.message_index_to_block_number(9));
    assert_eq!(engine.safe_block()?.number, engine.message_index_to_block_number(14));
    assert_eq!(engine.finalized_block()?.number, GENESIS_BLOCK_NUMBER + 9);

    // When
    orchestrator.coordinator().force_rollback(6);

    // Then
    assert_eq!(engine.finalized_block(), Err(EngineError::FinalizedBlockNotFound));
    assert_eq!(engine.safe_block(), Err(EngineError::SafeBlockNotFound));
    assert_eq!(engine.finality(FinalityTier::Validated), None);
    assert_eq!(engine.executed_count(), 6);
    assert_eq!(engine.store().count(), 15);

    Ok(())
}

#[tokio::test]
async fn test_reexecution_after_rollback_is_deterministic() -> eyre::Result<()> {
    // Given
    let (orchestrator, _, engine) = extracted_and_executed().await?;
    let before: Vec<_> = (0..15).map(|i| engine.result_at_message_index(i)).collect();

    // When
    orchestrator.coordinator().force_rollback(6);
    let reexecuted = execute_all(&engine);

    // Then
    let after: Vec<_> = (0..15).map(|i| engine.result_at_message_index(i)).collect();
    assert_eq!(reexecuted, 9);
    assert_eq!(before, after);
    assert_eq!(engine.head_block().map(|b| b.number), Some(GENESIS_BLOCK_NUMBER + 14));

    Ok(())
}

#[tokio::test]
async fn test_reorg_cannot_drop_finalized_messages() -> eyre::Result<()> {
    // Given
    let (orchestrator, db, engine) = extracted_and_executed().await?;
    engine.set_finality_data(&ConsensusFinality {
        finalized: Some(finality_data(&engine, 9)?),
        ..Default::default()
    })?;
    let checkpoint = db.latest_state_with_message_count_at_most(6).await?.expect("checkpoint");

    // When
    let res = orchestrator.coordinator().reorg_to_checkpoint(checkpoint).await;

    // Then
    assert_eq!(res, Err(ReorgError::ReorgBelowFinalized { count: 6, finalized: 10 }));
    assert_eq!(engine.store().count(), 15);
    assert_eq!(engine.executed_count(), 15);
    assert_eq!(engine.finality(FinalityTier::Finalized).map(|f| f.msg_idx), Some(9));

    Ok(())
}
