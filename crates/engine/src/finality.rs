//! The finality tiers of the execution engine.

use crate::{EngineConfig, EngineError, EngineResult};
use alloy_primitives::B256;
use rollup_primitives::{ConsensusFinality, FinalityData, MessageIndex};

/// A finality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum FinalityTier {
    /// The safe tier.
    #[display("safe")]
    Safe,
    /// The finalized tier.
    #[display("finalized")]
    Finalized,
    /// The validated tier.
    #[display("validated")]
    Validated,
}

/// The finality marks held by the engine. Each mark points at an executed block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FinalityMarks {
    pub(crate) safe: Option<FinalityData>,
    pub(crate) finalized: Option<FinalityData>,
    pub(crate) validated: Option<FinalityData>,
}

impl FinalityMarks {
    pub(crate) const fn get(&self, tier: FinalityTier) -> Option<FinalityData> {
        match tier {
            FinalityTier::Safe => self.safe,
            FinalityTier::Finalized => self.finalized,
            FinalityTier::Validated => self.validated,
        }
    }

    fn slot(&mut self, tier: FinalityTier) -> &mut Option<FinalityData> {
        match tier {
            FinalityTier::Safe => &mut self.safe,
            FinalityTier::Finalized => &mut self.finalized,
            FinalityTier::Validated => &mut self.validated,
        }
    }

    /// Applies the validated update, ignoring moves backwards. Returns `true` if a mark changed.
    pub(crate) fn apply(&mut self, update: &FinalityUpdate) -> bool {
        let mut changed = false;
        for (tier, target) in update.tiers() {
            let slot = self.slot(tier);
            match (target, *slot) {
                (Target::Keep, _) | (Target::Clear, None) => {}
                (Target::Clear, Some(_)) => {
                    tracing::info!(target: "rollup::engine", %tier, "clearing finality tier");
                    *slot = None;
                    changed = true;
                }
                (Target::Set(data), Some(current)) if data.msg_idx < current.msg_idx => {
                    tracing::warn!(target: "rollup::engine", %tier, current = current.msg_idx, requested = data.msg_idx, "ignoring finality moving backwards");
                }
                (Target::Set(data), current) => {
                    if current != Some(data) {
                        tracing::debug!(target: "rollup::engine", %tier, %data, "updating finality tier");
                        *slot = Some(data);
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    /// Clears every mark above the message count.
    pub(crate) fn truncate(&mut self, count: u64) {
        for tier in [FinalityTier::Safe, FinalityTier::Finalized, FinalityTier::Validated] {
            let slot = self.slot(tier);
            if slot.is_some_and(|data| data.msg_idx >= count) {
                tracing::info!(target: "rollup::engine", %tier, count, "clearing finality tier above rollback");
                *slot = None;
            }
        }
    }
}

/// The target of a finality tier in an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    /// The tier is left unchanged.
    Keep,
    /// The tier is cleared.
    Clear,
    /// The tier is set.
    Set(FinalityData),
}

/// A finality update whose targets all point at executed blocks with matching hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FinalityUpdate {
    pub(crate) safe: Target,
    pub(crate) finalized: Target,
    pub(crate) validated: Target,
}

impl FinalityUpdate {
    const fn tiers(&self) -> [(FinalityTier, Target); 3] {
        [
            (FinalityTier::Validated, self.validated),
            (FinalityTier::Safe, self.safe),
            (FinalityTier::Finalized, self.finalized),
        ]
    }

    /// Returns an update setting the finalized tier only.
    pub(crate) const fn finalized(data: FinalityData) -> Self {
        Self { safe: Target::Keep, finalized: Target::Set(data), validated: Target::Keep }
    }

    /// Validates the requested finality against the executed blocks.
    ///
    /// `block_hash` returns the hash of the block executed for a message index, if any. Every
    /// tier is validated before the update is returned, so an error leaves all tiers unchanged.
    pub(crate) fn validate(
        request: &ConsensusFinality,
        config: &EngineConfig,
        block_hash: impl Fn(MessageIndex) -> Option<B256>,
    ) -> EngineResult<Self> {
        for (tier, data) in [
            (FinalityTier::Safe, request.safe),
            (FinalityTier::Finalized, request.finalized),
            (FinalityTier::Validated, request.validated),
        ] {
            if data.is_some_and(|data| data.block_hash.is_zero()) {
                return Err(EngineError::InvalidFinalityHash(tier));
            }
        }

        let validated = check(FinalityTier::Validated, request.validated, &block_hash)?;
        let gate = |tier: FinalityTier, wait: bool, data: Option<FinalityData>| -> EngineResult<Target> {
            if !wait {
                return check(tier, data, &block_hash);
            }
            let Some(data) = data else { return Ok(Target::Clear) };
            let validated = request.validated.ok_or(EngineError::ValidatorNotSet)?;
            if data.msg_idx <= validated.msg_idx {
                return check(tier, Some(data), &block_hash);
            }
            // the tier cannot pass the validated block.
            Ok(validated_target(validated, &block_hash).map_or(Target::Keep, Target::Set))
        };

        let safe = gate(FinalityTier::Safe, config.safe_wait_for_validator, request.safe)?;
        let finalized =
            gate(FinalityTier::Finalized, config.finalized_wait_for_validator, request.finalized)?;

        Ok(Self { safe, finalized, validated })
    }
}

/// Returns the target for the tier, checking the supplied hash against the executed block.
fn check(
    tier: FinalityTier,
    data: Option<FinalityData>,
    block_hash: impl Fn(MessageIndex) -> Option<B256>,
) -> EngineResult<Target> {
    let Some(data) = data else { return Ok(Target::Clear) };
    match block_hash(data.msg_idx) {
        None => {
            tracing::debug!(target: "rollup::engine", %tier, msg_idx = data.msg_idx, "finality block not executed yet");
            Ok(Target::Keep)
        }
        Some(executed) if executed != data.block_hash => {
            Err(EngineError::FinalityBlockHashMismatch {
                tier,
                msg_idx: data.msg_idx,
                executed,
                got: data.block_hash,
            })
        }
        Some(_) => Ok(Target::Set(data)),
    }
}

/// Returns the validated finality if its block is executed.
fn validated_target(
    validated: FinalityData,
    block_hash: impl Fn(MessageIndex) -> Option<B256>,
) -> Option<FinalityData> {
    block_hash(validated.msg_idx).map(|hash| FinalityData::new(validated.msg_idx, hash))
}
