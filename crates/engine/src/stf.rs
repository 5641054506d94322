//! The state transition function applying messages to the execution state.

use crate::{BlockHeader, EngineConfig, ExecutionState, L2Block, Log, Receipt};
use alloy_primitives::{keccak256, Address, B256, U256};
use rollup_codec::decode_l2_transactions;
use rollup_primitives::{L2Transaction, Message, MessageIndex, MessageKind, MessageWithMetadata};
use rollup_retryables::{
    escrow_address, intrinsic_gas, redeem_target, ticket_id, BlockContext, DefaultRedeemExecutor,
    RedeemExecutor, RetryableEvent, RetryableStatus, SubmitRetryable,
    RETRYABLE_PRECOMPILE_ADDRESS,
};
use std::{fmt::Debug, sync::Arc};

/// The environment of the block produced by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEnv {
    /// The hash of the parent block.
    pub parent_hash: B256,
    /// The timestamp of the parent block.
    pub parent_timestamp: u64,
    /// The number of the produced block.
    pub number: u64,
    /// The index of the applied message.
    pub message_index: MessageIndex,
}

/// Applies a message on top of a state, producing exactly one block.
///
/// Implementations must be deterministic: the result may only depend on the arguments.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait StateTransition: Debug + Send + Sync {
    /// Returns the state and the block produced by the message.
    fn apply_message(
        &self,
        prior: &ExecutionState,
        env: &BlockEnv,
        message: &MessageWithMetadata,
    ) -> (ExecutionState, L2Block);
}

/// The default [`StateTransition`].
///
/// Transaction lists, deposits and retryable tickets are applied. Every other message kind
/// produces an empty block.
#[derive(Debug, Clone)]
pub struct DefaultStateTransition {
    base_fee: U256,
    executor: Arc<dyn RedeemExecutor>,
}

impl DefaultStateTransition {
    /// Returns a new [`DefaultStateTransition`] redeeming tickets with the
    /// [`DefaultRedeemExecutor`].
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_executor(config, Arc::new(DefaultRedeemExecutor))
    }

    /// Returns a new [`DefaultStateTransition`] redeeming tickets with the executor.
    pub fn with_executor(config: &EngineConfig, executor: Arc<dyn RedeemExecutor>) -> Self {
        Self { base_fee: config.base_fee, executor }
    }

    fn apply_transactions(
        &self,
        state: &mut ExecutionState,
        message: &Message,
        out: &mut BlockOutput,
    ) {
        let transactions = match decode_l2_transactions(&message.payload) {
            Ok(transactions) => transactions,
            Err(err) => {
                tracing::debug!(target: "rollup::engine", ?err, "failed to decode l2 message");
                return;
            }
        };

        for tx in transactions {
            let Some(gas_used) = self.charge(state, &tx) else { continue };

            let receipt = match redeem_target(&tx) {
                Some(id) => {
                    let gas = tx.gas_limit - gas_used;
                    match state.retryables_mut().redeem(id, gas, &*self.executor) {
                        Ok(receipt) => {
                            apply_retryable_events(state, &receipt.events);
                            Receipt {
                                tx_hash: tx.hash(),
                                success: receipt.status == RetryableStatus::ManuallyRedeemed,
                                gas_used: gas_used + gas,
                                logs: receipt.events.iter().map(retryable_log).collect(),
                            }
                        }
                        Err(err) => {
                            tracing::debug!(target: "rollup::engine", %id, %err, "redeem of unknown ticket");
                            Receipt { tx_hash: tx.hash(), success: false, gas_used, logs: vec![] }
                        }
                    }
                }
                None => {
                    let success = state.transfer(tx.from, tx.to, tx.value);
                    Receipt { tx_hash: tx.hash(), success, gas_used, logs: vec![] }
                }
            };

            out.receipts.push(receipt);
            out.transactions.push(tx);
        }
    }

    /// Checks the transaction can pay for its execution, then charges its fee and bumps the
    /// sender nonce. Returns the intrinsic gas, or `None` if the transaction is not included.
    fn charge(&self, state: &mut ExecutionState, tx: &L2Transaction) -> Option<u64> {
        let gas_used = intrinsic_gas(&tx.input);
        let nonce = state.nonce(tx.from);
        if tx.nonce != nonce || tx.gas_limit < gas_used || tx.max_fee_per_gas < self.base_fee {
            tracing::trace!(target: "rollup::engine", hash = %tx.hash(), nonce, gas_used, "dropping invalid transaction");
            return None;
        }

        let fee = self.base_fee.saturating_mul(U256::from(gas_used));
        if state.balance(tx.from) < fee.saturating_add(tx.value) || !state.debit(tx.from, fee) {
            tracing::trace!(target: "rollup::engine", hash = %tx.hash(), "dropping transaction with insufficient funds");
            return None;
        }
        state.bump_nonce(tx.from);

        Some(gas_used)
    }

    fn apply_submission(
        &self,
        state: &mut ExecutionState,
        message: &Message,
        ctx: &BlockContext,
        out: &mut BlockOutput,
    ) {
        let id = ticket_id(message);
        let failed = Receipt { tx_hash: id, success: false, gas_used: 0, logs: vec![] };
        let submission = match SubmitRetryable::try_from(message) {
            Ok(submission) => submission,
            Err(err) => {
                tracing::debug!(target: "rollup::engine", %id, %err, "invalid retryable submission");
                out.receipts.push(failed);
                return;
            }
        };

        let from = message.header.poster;
        let escrow = escrow_address(id);
        state.credit(from, submission.deposit);
        if !state.transfer(from, escrow, submission.callvalue) {
            tracing::debug!(target: "rollup::engine", %id, "retryable call value exceeds the deposit");
            out.receipts.push(failed);
            return;
        }

        match state.retryables_mut().submit(message, ctx, &*self.executor) {
            Ok(receipt) => {
                apply_retryable_events(state, &receipt.events);
                out.receipts.push(Receipt {
                    tx_hash: id,
                    success: true,
                    gas_used: 0,
                    logs: receipt.events.iter().map(retryable_log).collect(),
                });
            }
            Err(err) => {
                tracing::debug!(target: "rollup::engine", %id, %err, "failed to submit retryable");
                state.transfer(escrow, from, submission.callvalue);
                out.receipts.push(failed);
            }
        }
    }
}

impl StateTransition for DefaultStateTransition {
    fn apply_message(
        &self,
        prior: &ExecutionState,
        env: &BlockEnv,
        message: &MessageWithMetadata,
    ) -> (ExecutionState, L2Block) {
        let mut state = prior.clone();
        let msg = &message.message;
        let timestamp = env.parent_timestamp.max(msg.header.timestamp);
        let ctx = BlockContext { timestamp, base_fee: self.base_fee };
        let mut out = BlockOutput::default();

        let expired = state.retryables_mut().reap_expired(timestamp);
        if !expired.is_empty() {
            apply_retryable_events(&mut state, &expired);
            out.receipts.extend(expired.iter().map(|event| Receipt {
                tx_hash: event.id(),
                success: true,
                gas_used: 0,
                logs: vec![retryable_log(event)],
            }));
        }

        match msg.kind() {
            MessageKind::L2Message => self.apply_transactions(&mut state, msg, &mut out),
            MessageKind::EthDeposit => apply_deposit(&mut state, msg, &mut out),
            MessageKind::SubmitRetryable => {
                self.apply_submission(&mut state, msg, &ctx, &mut out)
            }
            kind => {
                tracing::trace!(target: "rollup::engine", %kind, index = env.message_index, "message produces an empty block");
            }
        }

        let header = BlockHeader {
            parent_hash: env.parent_hash,
            number: env.number,
            timestamp,
            message_index: env.message_index,
            message_hash: msg.hash(),
            delayed_messages_read: message.delayed_messages_read,
            state_root: state.state_root(),
            ..Default::default()
        };

        (state, L2Block::seal(header, out.transactions, out.receipts))
    }
}

#[derive(Debug, Default)]
struct BlockOutput {
    transactions: Vec<L2Transaction>,
    receipts: Vec<Receipt>,
}

/// Credits a deposit: a 20 bytes recipient followed by a 32 bytes value.
fn apply_deposit(state: &mut ExecutionState, message: &Message, out: &mut BlockOutput) {
    let payload = &message.payload;
    let Some(request_id) = message.header.request_id.filter(|_| payload.len() >= 52) else {
        tracing::debug!(target: "rollup::engine", len = payload.len(), "invalid deposit");
        return;
    };
    let to = Address::from_slice(&payload[..20]);
    let value = U256::from_be_slice(&payload[20..52]);
    state.credit(to, value);
    out.receipts.push(Receipt { tx_hash: request_id, success: true, gas_used: 0, logs: vec![] });
}

/// Moves the escrowed call values of redeemed and expired tickets.
fn apply_retryable_events(state: &mut ExecutionState, events: &[RetryableEvent]) {
    for event in events {
        match event {
            RetryableEvent::RedeemSucceeded { id, to, value } => {
                state.transfer(escrow_address(*id), *to, *value);
            }
            RetryableEvent::Expired { id, beneficiary, value } => {
                state.transfer(escrow_address(*id), *beneficiary, *value);
            }
            _ => {}
        }
    }
}

/// Returns the log emitted by the retryable precompile for the event.
pub fn retryable_log(event: &RetryableEvent) -> Log {
    let mut data = Vec::new();
    let signature = match event {
        RetryableEvent::TicketCreated { .. } => "TicketCreated(bytes32)",
        RetryableEvent::RedeemScheduled { num_tries, gas, .. } => {
            data.extend_from_slice(&U256::from(*num_tries).to_be_bytes::<32>());
            data.extend_from_slice(&U256::from(*gas).to_be_bytes::<32>());
            "RedeemScheduled(bytes32,uint64,uint64)"
        }
        RetryableEvent::RedeemSucceeded { to, value, .. } => {
            data.extend_from_slice(to.into_word().as_slice());
            data.extend_from_slice(&value.to_be_bytes::<32>());
            "RedeemSucceeded(bytes32,address,uint256)"
        }
        RetryableEvent::RedeemFailed { num_tries, reason, .. } => {
            data.extend_from_slice(&U256::from(*num_tries).to_be_bytes::<32>());
            data.extend_from_slice(reason.as_bytes());
            "RedeemFailed(bytes32,uint64,string)"
        }
        RetryableEvent::Expired { beneficiary, value, .. } => {
            data.extend_from_slice(beneficiary.into_word().as_slice());
            data.extend_from_slice(&value.to_be_bytes::<32>());
            "Expired(bytes32,address,uint256)"
        }
    };

    Log {
        address: RETRYABLE_PRECOMPILE_ADDRESS,
        topics: vec![keccak256(signature), event.id()],
        data: data.into(),
    }
}
