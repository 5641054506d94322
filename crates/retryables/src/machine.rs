use crate::{
    metrics::RetryableMetrics, ticket_id, RedeemExecutor, RedeemOutcome, RetryableConfig,
    RetryableError, RetryableEvent, RetryableReceipt, RetryableStatus, RetryableTicket,
    SubmitRetryable,
};
use alloy_primitives::{keccak256, B256, U256};
use rollup_primitives::Message;
use std::collections::BTreeMap;

/// The block the retryable operations execute in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockContext {
    /// The block timestamp.
    pub timestamp: u64,
    /// The block base fee.
    pub base_fee: U256,
}

/// Tracks the live retryable tickets.
///
/// The state machine is driven purely by message content: replaying the same messages in the
/// same blocks produces the same tickets and events.
#[derive(Debug, Clone)]
pub struct RetryableStateMachine {
    /// The live tickets, by id.
    tickets: BTreeMap<B256, RetryableTicket>,
    /// The configuration.
    config: RetryableConfig,
    /// The metrics.
    metrics: RetryableMetrics,
}

impl RetryableStateMachine {
    /// Returns a new state machine holding no tickets.
    pub fn new(config: RetryableConfig) -> Self {
        Self { tickets: BTreeMap::new(), config, metrics: RetryableMetrics::default() }
    }

    /// Returns the configuration.
    pub const fn config(&self) -> &RetryableConfig {
        &self.config
    }

    /// Returns the live ticket with the id.
    pub fn ticket(&self, id: B256) -> Result<&RetryableTicket, RetryableError> {
        self.tickets.get(&id).ok_or(RetryableError::TicketNotFound(id))
    }

    /// Returns the number of live tickets.
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Returns `true` if no ticket is live.
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Returns the live tickets, ordered by id.
    pub fn tickets(&self) -> impl Iterator<Item = &RetryableTicket> {
        self.tickets.values()
    }

    /// Returns the commitment to the live tickets.
    pub fn commitment(&self) -> B256 {
        let tickets: Vec<_> = self.tickets.values().cloned().collect();
        keccak256(alloy_rlp::encode(&tickets))
    }

    /// Creates the ticket submitted by the message and runs its auto-redeem if the submission
    /// provides enough gas at a high enough bid.
    ///
    /// A failed auto-redeem is an ordinary outcome: the ticket survives and the receipt records
    /// the failure.
    #[tracing::instrument(skip_all, fields(timestamp = ctx.timestamp))]
    pub fn submit(
        &mut self,
        message: &Message,
        ctx: &BlockContext,
        executor: &dyn RedeemExecutor,
    ) -> Result<RetryableReceipt, RetryableError> {
        let submission = SubmitRetryable::try_from(message)?;
        let id = ticket_id(message);
        if self.tickets.contains_key(&id) {
            return Err(RetryableError::TicketExists(id));
        }

        let ticket = RetryableTicket {
            id,
            from: message.header.poster,
            to: submission.to,
            callvalue: submission.callvalue,
            beneficiary: submission.beneficiary,
            fee_refund_address: submission.fee_refund_address,
            calldata: submission.calldata.clone(),
            deadline: ctx.timestamp.saturating_add(self.config.lifetime),
            num_tries: 0,
            status: RetryableStatus::Submitted,
        };
        self.tickets.insert(id, ticket);
        self.metrics.tickets_created.increment(1);
        tracing::debug!(target: "rollup::retryables", %id, deadline = ctx.timestamp.saturating_add(self.config.lifetime), "created retryable ticket");

        let mut events = vec![RetryableEvent::TicketCreated { id }];

        let required = submission.auto_redeem_gas_required(self.config.auto_redeem_gas_threshold);
        if submission.gas_limit < required || submission.max_fee_per_gas < ctx.base_fee {
            tracing::trace!(target: "rollup::retryables", %id, gas = submission.gas_limit, required, "auto-redeem not scheduled");
            return Ok(RetryableReceipt { id, status: RetryableStatus::Submitted, events });
        }

        let succeeded = self.attempt(id, submission.gas_limit, executor, &mut events)?;
        let status = if succeeded {
            RetryableStatus::AutoRedeemSucceeded
        } else {
            RetryableStatus::AutoRedeemFailed
        };
        self.record(id, status);

        Ok(RetryableReceipt { id, status, events })
    }

    /// Redeems the live ticket with the gas.
    #[tracing::instrument(skip_all, fields(%id, gas))]
    pub fn redeem(
        &mut self,
        id: B256,
        gas: u64,
        executor: &dyn RedeemExecutor,
    ) -> Result<RetryableReceipt, RetryableError> {
        let mut events = Vec::new();
        let succeeded = self.attempt(id, gas, executor, &mut events)?;
        let status =
            if succeeded { RetryableStatus::ManuallyRedeemed } else { RetryableStatus::RedeemFailed };
        self.record(id, status);

        Ok(RetryableReceipt { id, status, events })
    }

    /// Deletes every ticket whose deadline is before the timestamp.
    pub fn reap_expired(&mut self, timestamp: u64) -> Vec<RetryableEvent> {
        let expired: Vec<_> = self
            .tickets
            .values()
            .filter(|ticket| ticket.is_expired_at(timestamp))
            .map(|ticket| ticket.id)
            .collect();

        let mut events = Vec::with_capacity(expired.len());
        for id in expired {
            let Some(ticket) = self.tickets.remove(&id) else { continue };
            tracing::debug!(target: "rollup::retryables", %id, deadline = ticket.deadline, timestamp, "retryable ticket expired");
            events.push(RetryableEvent::Expired {
                id,
                beneficiary: ticket.beneficiary,
                value: ticket.callvalue,
            });
        }
        self.metrics.tickets_expired.increment(events.len() as u64);

        events
    }

    /// Runs one redeem attempt. Returns `true` if the ticket was redeemed and deleted.
    fn attempt(
        &mut self,
        id: B256,
        gas: u64,
        executor: &dyn RedeemExecutor,
        events: &mut Vec<RetryableEvent>,
    ) -> Result<bool, RetryableError> {
        let ticket = self.tickets.get_mut(&id).ok_or(RetryableError::TicketNotFound(id))?;
        ticket.num_tries += 1;
        self.metrics.redeem_attempts.increment(1);
        events.push(RetryableEvent::RedeemScheduled { id, num_tries: ticket.num_tries, gas });

        match executor.execute(ticket, gas) {
            RedeemOutcome::Succeeded => {
                events.push(RetryableEvent::RedeemSucceeded {
                    id,
                    to: ticket.to,
                    value: ticket.callvalue,
                });
                self.tickets.remove(&id);
                Ok(true)
            }
            RedeemOutcome::Failed(reason) => {
                tracing::debug!(target: "rollup::retryables", %id, num_tries = ticket.num_tries, %reason, "redeem attempt failed");
                self.metrics.redeem_failures.increment(1);
                events.push(RetryableEvent::RedeemFailed { id, num_tries: ticket.num_tries, reason });
                Ok(false)
            }
        }
    }

    fn record(&mut self, id: B256, status: RetryableStatus) {
        if let Some(ticket) = self.tickets.get_mut(&id) {
            ticket.status = status;
        }
    }
}

impl Default for RetryableStateMachine {
    fn default() -> Self {
        Self::new(RetryableConfig::default())
    }
}
