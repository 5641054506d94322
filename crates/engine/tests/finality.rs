//! Tests for the finality tiers of the execution engine.

use alloy_primitives::B256;
use rollup_engine::{
    test_utils::engine_with_blocks, EngineConfig, EngineError, ExecutionEngine, FinalityTier,
};
use rollup_primitives::{ConsensusFinality, FinalityData};

fn finality_at(engine: &ExecutionEngine, index: u64) -> eyre::Result<FinalityData> {
    Ok(FinalityData::new(index, engine.result_at_message_index(index)?.block_hash))
}

#[test]
fn test_should_set_safe_and_finalized_blocks() -> eyre::Result<()> {
    // Given
    let engine = engine_with_blocks(EngineConfig { genesis_block_number: 100, ..Default::default() }, 15);
    assert_eq!(engine.finalized_block(), Err(EngineError::FinalizedBlockNotFound));
    assert_eq!(engine.safe_block().map_err(|err| err.to_string()), Err("safe block not found".into()));

    // When
    engine.set_finality_data(&ConsensusFinality {
        safe: Some(finality_at(&engine, 14)?),
        finalized: Some(finality_at(&engine, 9)?),
        validated: None,
    })?;

    // Then
    assert_eq!(engine.finalized_block()?.number, 109);
    assert_eq!(engine.safe_block()?.number, 114);
    assert_eq!(engine.block_number_to_message_index(109)?, 9);
    assert_eq!(engine.store().finalized_count(), 10);
    assert_eq!(*engine.subscribe_finalized().borrow(), Some(109));

    Ok(())
}

#[test]
fn test_hash_mismatch_leaves_finality_unchanged() -> eyre::Result<()> {
    // Given
    let engine = engine_with_blocks(EngineConfig::default(), 15);
    let finalized = finality_at(&engine, 9)?;
    engine.set_finality_data(&ConsensusFinality {
        safe: Some(finality_at(&engine, 10)?),
        finalized: Some(finalized),
        validated: None,
    })?;

    // When
    let res = engine.set_finality_data(&ConsensusFinality {
        safe: Some(finality_at(&engine, 14)?),
        finalized: Some(FinalityData::new(12, B256::repeat_byte(0xab))),
        validated: None,
    });

    // Then
    let err = res.expect_err("hash differs from the executed block");
    assert!(matches!(
        err,
        EngineError::FinalityBlockHashMismatch { tier: FinalityTier::Finalized, msg_idx: 12, .. }
    ));
    assert!(err.is_fatal());
    assert_eq!(engine.finality(FinalityTier::Finalized), Some(finalized));
    assert_eq!(engine.safe_block()?.number, 10);

    Ok(())
}

#[test]
fn test_finality_never_moves_backwards() -> eyre::Result<()> {
    // Given
    let engine = engine_with_blocks(EngineConfig::default(), 15);
    let request = |safe, finalized| -> eyre::Result<ConsensusFinality> {
        Ok(ConsensusFinality {
            safe: Some(finality_at(&engine, safe)?),
            finalized: Some(finality_at(&engine, finalized)?),
            validated: None,
        })
    };
    engine.set_finality_data(&request(12, 9)?)?;

    // When
    engine.set_finality_data(&request(11, 5)?)?;

    // Then
    assert_eq!(engine.safe_block()?.number, 12);
    assert_eq!(engine.finalized_block()?.number, 9);

    Ok(())
}

#[test]
fn test_should_reject_zero_hash_and_skip_unexecuted_blocks() -> eyre::Result<()> {
    // Given
    let engine = engine_with_blocks(EngineConfig::default(), 5);
    let finalized = finality_at(&engine, 2)?;

    // When
    let zero = engine.set_finality_data(&ConsensusFinality {
        safe: Some(FinalityData::new(3, B256::ZERO)),
        finalized: Some(finalized),
        validated: None,
    });
    engine.set_finality_data(&ConsensusFinality {
        safe: Some(FinalityData::new(40, B256::repeat_byte(1))),
        finalized: Some(finalized),
        validated: None,
    })?;

    // Then
    assert_eq!(zero, Err(EngineError::InvalidFinalityHash(FinalityTier::Safe)));
    assert_eq!(engine.finalized_block()?.number, 2);
    assert_eq!(engine.safe_block(), Err(EngineError::SafeBlockNotFound));

    Ok(())
}

#[test]
fn test_missing_tier_clears_it() -> eyre::Result<()> {
    // Given
    let engine = engine_with_blocks(EngineConfig::default(), 5);
    engine.set_finality_data(&ConsensusFinality {
        safe: Some(finality_at(&engine, 4)?),
        finalized: Some(finality_at(&engine, 3)?),
        validated: None,
    })?;

    // When
    engine.set_finality_data(&ConsensusFinality {
        safe: None,
        finalized: Some(finality_at(&engine, 3)?),
        validated: None,
    })?;

    // Then
    assert_eq!(engine.safe_block(), Err(EngineError::SafeBlockNotFound));
    assert_eq!(engine.finalized_block()?.number, 3);

    Ok(())
}

#[test]
fn test_validator_gating_caps_tiers() -> eyre::Result<()> {
    // Given
    let config = EngineConfig {
        safe_wait_for_validator: true,
        finalized_wait_for_validator: true,
        ..Default::default()
    };
    let engine = engine_with_blocks(config, 15);

    // When
    let unset = engine.set_finality_data(&ConsensusFinality {
        safe: Some(finality_at(&engine, 14)?),
        finalized: None,
        validated: None,
    });
    engine.set_finality_data(&ConsensusFinality {
        safe: Some(finality_at(&engine, 14)?),
        finalized: Some(finality_at(&engine, 3)?),
        validated: Some(finality_at(&engine, 7)?),
    })?;

    // Then
    assert_eq!(unset, Err(EngineError::ValidatorNotSet));
    assert_eq!(engine.safe_block()?.number, 7);
    assert_eq!(engine.finalized_block()?.number, 3);
    assert_eq!(engine.validated_block().map(|b| b.number), Some(7));

    Ok(())
}

#[test]
fn test_set_finalized_by_block_number() -> eyre::Result<()> {
    // Given
    let config = EngineConfig { finalized_wait_for_validator: true, ..Default::default() };
    let engine = engine_with_blocks(config, 10);

    // When
    engine.set_finalized(6)?;
    let above_head = engine.set_finalized(10);

    // Then
    assert_eq!(engine.finalized_block()?.number, 6);
    assert_eq!(above_head, Err(EngineError::BlockNotFound(10)));
    assert!(above_head.is_err_and(|err| err.is_transient()));

    Ok(())
}

#[test]
fn test_rollback_below_finality_clears_tiers() -> eyre::Result<()> {
    // Given
    let engine = engine_with_blocks(EngineConfig::default(), 15);
    let hash_at_8 = finality_at(&engine, 8)?.block_hash;
    engine.set_finality_data(&ConsensusFinality {
        safe: Some(finality_at(&engine, 14)?),
        finalized: Some(finality_at(&engine, 9)?),
        validated: None,
    })?;

    // When
    engine.rollback_to(&engine.store().lock(), 6);

    // Then
    assert_eq!(engine.finalized_block(), Err(EngineError::FinalizedBlockNotFound));
    assert_eq!(engine.safe_block(), Err(EngineError::SafeBlockNotFound));
    assert_eq!(engine.head_block().map(|b| b.number), Some(5));
    assert_eq!(*engine.subscribe_finalized().borrow(), None);

    // the messages are still in the store, so they replay to the same blocks.
    rollup_engine::test_utils::execute_all(&engine);
    assert_eq!(engine.executed_count(), 15);
    assert_eq!(finality_at(&engine, 8)?.block_hash, hash_at_8);

    Ok(())
}
