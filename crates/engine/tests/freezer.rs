//! Tests for the freezer moving finalized blocks into the ancient store.

use alloy_primitives::{Address, B256, U256};
use rollup_db::{AncientTable, MessageStore};
use rollup_engine::{
    test_utils::{append_messages, deposit, engine_with_blocks, execute_all},
    EngineConfig, ExecutionEngine,
};
use rollup_primitives::{fatal_error_channel, ConsensusFinality, FinalityData};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

fn block_hashes(engine: &ExecutionEngine, count: u64) -> Vec<B256> {
    (0..count).filter_map(|number| engine.block_by_number(number)).map(|b| b.hash).collect()
}

#[test]
fn test_should_freeze_up_to_finalized_block() -> eyre::Result<()> {
    // Given
    let engine = engine_with_blocks(EngineConfig::default(), 20);

    // When
    engine.set_finalized(12)?;
    let frozen = engine.freeze_pending()?;

    // Then
    let ancients = engine.ancients();
    assert_eq!(frozen, 13);
    assert_eq!(ancients.ancients(), 13);
    assert!(ancients.has_ancient(AncientTable::Headers, 10));
    assert!(ancients.has_ancient(AncientTable::Receipts, 12));
    assert!(!ancients.has_ancient(AncientTable::Headers, 17));
    let hash = ancients.ancient(AncientTable::Hashes, 12).expect("frozen hash");
    assert_eq!(hash.as_ref(), engine.finalized_block()?.hash.as_slice());

    Ok(())
}

#[test]
fn test_should_freeze_in_batches_and_resume() -> eyre::Result<()> {
    // Given
    let config = EngineConfig { freezer_batch_size: 4, genesis_block_number: 50, ..Default::default() };
    let engine = engine_with_blocks(config, 12);
    engine.set_finalized(59)?;

    // When
    let first = engine.freeze_batch()?;
    let second = engine.freeze_batch()?;
    let rest = engine.freeze_pending()?;

    // Then
    assert_eq!((first, second, rest), (4, 4, 2));
    assert_eq!(engine.ancients().ancients(), 60);
    assert!(!engine.ancients().has_ancient(AncientTable::Bodies, 49));
    assert_eq!(engine.freeze_batch()?, 0);

    Ok(())
}

#[test]
fn test_rollback_truncates_frozen_blocks() -> eyre::Result<()> {
    // Given
    let engine = engine_with_blocks(EngineConfig::default(), 10);
    engine.set_finalized(8)?;
    engine.freeze_pending()?;

    // When
    engine.rollback_to(&engine.store().lock(), 4);

    // Then
    assert_eq!(engine.ancients().ancients(), 4);
    assert!(!engine.ancients().has_ancient(AncientTable::Hashes, 4));
    assert_eq!(engine.freeze_pending()?, 0);

    Ok(())
}

#[test]
fn test_frozen_blocks_are_served_from_ancient_store() -> eyre::Result<()> {
    // Given
    let engine = engine_with_blocks(EngineConfig::default(), 20);
    let blocks = (0..20).filter_map(|n| engine.block_by_number(n)).collect::<Vec<_>>();
    let head = engine.head_block();

    // When
    engine.set_finalized(12)?;
    engine.freeze_pending()?;

    // Then
    for block in &blocks {
        assert_eq!(engine.block_by_number(block.number()).as_ref(), Some(block));
        assert_eq!(engine.block_by_hash(block.hash).as_ref(), Some(block));
        assert_eq!(engine.result_at_message_index(block.message_index())?.block_hash, block.hash);
    }
    assert_eq!(engine.head_block(), head);

    // the finalized block is frozen and still validates.
    let finalized = FinalityData::new(12, blocks[12].hash);
    let finality = ConsensusFinality { finalized: Some(finalized), ..Default::default() };
    engine.set_finality_data(&finality)?;
    assert_eq!(engine.finalized_block()?.hash, blocks[12].hash);

    Ok(())
}

#[test]
fn test_rollback_below_frozen_blocks_restores_state() -> eyre::Result<()> {
    // Given
    let alice = Address::repeat_byte(0xa1);
    let store = Arc::new(MessageStore::new());
    append_messages(&store, (0..12).map(|seq_num| deposit(seq_num, alice, U256::from(1))));
    let config = EngineConfig { state_snapshot_interval: 4, ..Default::default() };
    let engine = ExecutionEngine::new(config, store.clone());
    execute_all(&engine);
    let hashes = block_hashes(&engine, 12);
    engine.set_finalized(9)?;
    engine.freeze_pending()?;

    // When
    engine.rollback_to(&store.lock(), 6);

    // Then
    assert_eq!(engine.executed_count(), 6);
    assert_eq!(engine.balance(alice), U256::from(6));
    assert_eq!(engine.ancients().ancients(), 6);
    assert_eq!(engine.head_block().map(|b| b.hash), Some(hashes[5]));

    assert_eq!(execute_all(&engine), 6);
    assert_eq!(engine.balance(alice), U256::from(12));
    assert_eq!(block_hashes(&engine, 12), hashes);

    // below the first snapshot the state is rebuilt from genesis.
    engine.set_finalized(9)?;
    engine.freeze_pending()?;
    engine.rollback_to(&store.lock(), 2);
    assert_eq!(engine.balance(alice), U256::from(2));
    assert_eq!(execute_all(&engine), 10);
    assert_eq!(engine.head_block().map(|b| b.hash), Some(hashes[11]));

    Ok(())
}

#[tokio::test]
async fn test_spawned_freezer_follows_finalized_block() -> eyre::Result<()> {
    // Given
    let engine = engine_with_blocks(EngineConfig { freezer_batch_size: 3, ..Default::default() }, 20);
    let cancel = CancellationToken::new();
    let (fatal, mut fatal_rx) = fatal_error_channel();
    let handle = engine.clone().spawn_freezer(cancel.clone(), fatal);

    // When
    engine.set_finalized(15)?;

    // Then
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.ancients().ancients() < 16 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    assert_eq!(engine.ancients().ancients(), 16);
    assert!(engine.ancients().has_ancient(AncientTable::Headers, 13));
    assert!(!engine.ancients().has_ancient(AncientTable::Headers, 20));

    cancel.cancel();
    handle.await?;
    assert!(fatal_rx.try_recv().is_none());

    Ok(())
}
