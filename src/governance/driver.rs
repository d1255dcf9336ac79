//! Proposal lifecycle driver.
//!
//! Takes one proposal from creation through execution:
//! 1. Make sure the voter has enough past-block voting power to propose
//! 2. Reuse the proposal if the governor already knows its id, else propose
//! 3. Wait (bounded) for the vote to open, vote once
//! 4. Wait for the vote to succeed
//! 5. Queue, sit out the timelock delay, execute
//!
//! Every step checks on-chain state first so an interrupted run can simply
//! be started again.

use alloy_primitives::{Address, B256, U256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use super::clock::Clock;
use super::error::{DriverError, DriverResult};
use super::poll::{poll_until, PollOutcome, PollPolicy};
use crate::chain::traits::{
    ChainError, ChainProvider, GovernanceContract, TimelockContract, VotingToken,
};
use crate::chain::types::{
    ProposalId, ProposalSpec, ProposalState, Receipt, TxHandle, VoteSupport, VotingPowerSnapshot,
};

/// Result of [`GovernanceDriver::cast_vote_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    AlreadyVoted,
    Cast(Receipt),
}

/// Result of a full [`GovernanceDriver::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The voter cannot reach the proposal threshold; nothing was proposed.
    InsufficientVotingPower(VotingPowerSnapshot),
    Executed(ProposalId),
    /// The proposal was already in a terminal state other than Executed.
    Closed {
        id: ProposalId,
        state: ProposalState,
    },
}

/// Orchestrates one proposal against injected chain handles.
pub struct GovernanceDriver<P, G, V, C> {
    provider: P,
    governor: G,
    token: V,
    clock: C,
    policy: PollPolicy,
}

impl<P, G, V, C> GovernanceDriver<P, G, V, C>
where
    P: ChainProvider,
    G: GovernanceContract,
    V: VotingToken,
    C: Clock,
{
    pub fn new(provider: P, governor: G, token: V, clock: C, policy: PollPolicy) -> Self {
        Self {
            provider,
            governor,
            token,
            clock,
            policy,
        }
    }

    /// Return the id of `spec`, proposing it first if the governor has never
    /// seen it.
    ///
    /// Only [`ChainError::ProposalNotFound`] means "not created yet"; every
    /// other failure is returned as is.
    pub async fn resolve_or_create_proposal(&self, spec: &ProposalSpec) -> DriverResult<ProposalId> {
        let (id, state) = self.proposal_status(spec).await?;
        if let Some(state) = state {
            info!(proposal_id = %id, state = %state, "proposal already exists, skipping creation");
            return Ok(id);
        }

        info!(
            proposal_id = %id,
            targets = ?spec.targets(),
            description = spec.description(),
            "submitting proposal"
        );
        let tx = self.governor.propose(spec).await.map_err(|e| tx_failed("propose", e))?;
        let receipt = self.confirm("propose", tx).await?;

        let id = self.governor.hash_proposal(spec).await?;
        info!(proposal_id = %id, block = receipt.block_number, "proposal created");
        Ok(id)
    }

    /// Id of `spec` and its state, or `None` if it has never been proposed.
    pub async fn proposal_status(
        &self,
        spec: &ProposalSpec,
    ) -> DriverResult<(ProposalId, Option<ProposalState>)> {
        let id = self.governor.hash_proposal(spec).await?;

        match self.governor.state(id).await {
            Ok(state) => Ok((id, Some(state))),
            Err(ChainError::ProposalNotFound(_)) => Ok((id, None)),
            Err(e) => Err(e.into()),
        }
    }

    /// Governor voting delay and voting period, in blocks.
    pub async fn voting_schedule(&self) -> DriverResult<(U256, U256)> {
        let delay = self.governor.voting_delay().await?;
        let period = self.governor.voting_period().await?;
        Ok((delay, period))
    }

    /// Snapshot of `voter`'s balance, delegate and votes one block below head.
    pub async fn voting_power(&self, voter: Address) -> DriverResult<VotingPowerSnapshot> {
        let balance = self.token.balance_of(voter).await?;
        let delegatee = self.token.delegates(voter).await?;
        let (block, votes) = self.past_votes(voter).await?;
        let threshold = self.governor.proposal_threshold().await?;

        Ok(VotingPowerSnapshot {
            balance,
            delegatee,
            votes,
            threshold,
            block,
        })
    }

    /// Make sure `voter` holds at least `threshold` votes, self-delegating if
    /// that could help.
    ///
    /// Returns true only when a read taken after any delegation meets the
    /// threshold.
    pub async fn ensure_voting_power(&self, voter: Address, threshold: U256) -> DriverResult<bool> {
        let balance = self.token.balance_of(voter).await?;
        let delegatee = self.token.delegates(voter).await?;
        let (block, votes) = self.past_votes(voter).await?;

        info!(
            voter = %voter,
            balance = %balance,
            delegatee = %delegatee,
            votes = %votes,
            threshold = %threshold,
            block,
            "voting power"
        );

        if votes >= threshold {
            return Ok(true);
        }

        if delegatee == voter {
            warn!(
                voter = %voter,
                votes = %votes,
                threshold = %threshold,
                "already self-delegated but below proposal threshold; acquire more voting tokens"
            );
            return Ok(false);
        }

        info!(voter = %voter, "delegating voting power to self");
        let tx = self.token.delegate(voter).await.map_err(|e| tx_failed("delegate", e))?;
        self.confirm("delegate", tx).await?;

        let (block, updated) = self.past_votes(voter).await?;
        info!(voter = %voter, votes = %updated, block, "updated voting power");

        if updated < threshold {
            warn!(
                votes = %updated,
                threshold = %threshold,
                "voting power still below proposal threshold, cannot create proposal"
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Vote on `id` unless `voter` already has.
    pub async fn cast_vote_once(
        &self,
        id: ProposalId,
        voter: Address,
        support: VoteSupport,
    ) -> DriverResult<VoteOutcome> {
        if self.governor.has_voted(id, voter).await? {
            info!(proposal_id = %id, voter = %voter, "vote already cast, skipping");
            return Ok(VoteOutcome::AlreadyVoted);
        }

        info!(proposal_id = %id, support = ?support, "casting vote");
        let tx = self
            .governor
            .cast_vote(id, support)
            .await
            .map_err(|e| tx_failed("castVote", e))?;
        let receipt = self.confirm("castVote", tx).await?;

        info!(proposal_id = %id, tx = %receipt.transaction_hash, "vote cast");
        Ok(VoteOutcome::Cast(receipt))
    }

    /// Poll until `id` is in `target`.
    ///
    /// With a timeout the wait ends with the retryable
    /// [`DriverError::Timeout`]; without one it never ends on its own.
    pub async fn await_state(
        &self,
        id: ProposalId,
        target: ProposalState,
        timeout: Option<Duration>,
    ) -> DriverResult<()> {
        self.await_any_state(id, &[target], timeout).await.map(|_| ())
    }

    /// Poll until `id` is in any of `targets` and return the state reached.
    ///
    /// A timeout reports the first target.
    async fn await_any_state(
        &self,
        id: ProposalId,
        targets: &[ProposalState],
        timeout: Option<Duration>,
    ) -> DriverResult<ProposalState> {
        let target = targets[0];
        let governor = &self.governor;
        let reported_terminal = AtomicBool::new(false);
        let reported_terminal = &reported_terminal;

        let outcome = poll_until(&self.clock, self.policy.interval, timeout, move || async move {
            let state = governor.state(id).await?;
            info!(proposal_id = %id, state = %state, target = %target, "current proposal state");

            let reached = targets.contains(&state);
            if !reached
                && state.is_terminal()
                && !reported_terminal.swap(true, Ordering::Relaxed)
            {
                warn!(
                    proposal_id = %id,
                    state = %state,
                    target = %target,
                    "proposal reached a terminal state and will not reach the target"
                );
            }
            Ok::<_, ChainError>(reached.then_some(state))
        })
        .await?;

        match outcome {
            PollOutcome::Ready(state) => Ok(state),
            PollOutcome::TimedOut { waited } => Err(DriverError::Timeout { id, target, waited }),
        }
    }

    /// Queue `spec`, wait out the timelock, execute it.
    ///
    /// Queueing requires state Succeeded and executing requires Queued; a
    /// proposal found past either step skips it.
    pub async fn queue_and_execute(
        &self,
        spec: &ProposalSpec,
        description_hash: B256,
    ) -> DriverResult<()> {
        let id = self.governor.hash_proposal(spec).await?;

        match self.governor.state(id).await? {
            ProposalState::Succeeded => {
                info!(proposal_id = %id, "queueing proposal");
                let tx = self
                    .governor
                    .queue(spec, description_hash)
                    .await
                    .map_err(|e| tx_failed("queue", e))?;
                self.confirm("queue", tx).await?;
                info!(proposal_id = %id, "proposal queued");
            }
            ProposalState::Queued => {
                info!(proposal_id = %id, "proposal already queued, skipping queue");
            }
            ProposalState::Executed => {
                info!(proposal_id = %id, "proposal already executed");
                return Ok(());
            }
            actual => {
                return Err(DriverError::UnexpectedState {
                    id,
                    expected: ProposalState::Succeeded,
                    actual,
                })
            }
        }

        let timelock = self.governor.timelock().await?;
        let delay = timelock.min_delay().await?;
        info!(proposal_id = %id, delay_secs = delay, "waiting for timelock delay");
        self.clock.sleep(Duration::from_secs(delay)).await;

        match self.governor.state(id).await? {
            ProposalState::Queued => {}
            ProposalState::Executed => {
                info!(proposal_id = %id, "proposal already executed");
                return Ok(());
            }
            actual => {
                return Err(DriverError::UnexpectedState {
                    id,
                    expected: ProposalState::Queued,
                    actual,
                })
            }
        }

        info!(proposal_id = %id, "executing proposal");
        let tx = self
            .governor
            .execute(spec, description_hash)
            .await
            .map_err(|e| tx_failed("execute", e))?;
        self.confirm("execute", tx).await?;
        info!(proposal_id = %id, "proposal executed");
        Ok(())
    }

    /// Drive `spec` end to end on behalf of `voter`.
    pub async fn run(
        &self,
        spec: &ProposalSpec,
        voter: Address,
        support: VoteSupport,
    ) -> DriverResult<RunOutcome> {
        // Voting power only gates creation; an existing proposal is resumed.
        let id = match self.proposal_status(spec).await? {
            (id, Some(state)) => {
                info!(proposal_id = %id, state = %state, "resuming existing proposal");
                id
            }
            (_, None) => {
                let threshold = self.governor.proposal_threshold().await?;
                if !self.ensure_voting_power(voter, threshold).await? {
                    let snapshot = self.voting_power(voter).await?;
                    return Ok(RunOutcome::InsufficientVotingPower(snapshot));
                }
                self.resolve_or_create_proposal(spec).await?
            }
        };

        let state = self.governor.state(id).await?;
        match state {
            ProposalState::Pending | ProposalState::Active => {
                info!(proposal_id = %id, "waiting for proposal to become active");
                self.await_state(id, ProposalState::Active, self.policy.active_timeout)
                    .await?;
                info!(proposal_id = %id, "proposal is active, voting");
                self.cast_vote_once(id, voter, support).await?;

                // Anyone may queue a succeeded proposal, so a later state also ends the wait.
                info!(proposal_id = %id, "waiting for voting period to end");
                let reached = self
                    .await_any_state(
                        id,
                        &[
                            ProposalState::Succeeded,
                            ProposalState::Queued,
                            ProposalState::Executed,
                        ],
                        None,
                    )
                    .await?;
                info!(proposal_id = %id, state = %reached, "voting finished");
            }
            ProposalState::Succeeded | ProposalState::Queued | ProposalState::Executed => {
                info!(proposal_id = %id, state = %state, "voting already finished");
            }
            ProposalState::Canceled | ProposalState::Defeated | ProposalState::Expired => {
                warn!(proposal_id = %id, state = %state, "proposal is closed");
                return Ok(RunOutcome::Closed { id, state });
            }
        }

        self.queue_and_execute(spec, spec.description_hash()).await?;
        Ok(RunOutcome::Executed(id))
    }

    async fn past_votes(&self, voter: Address) -> DriverResult<(u64, U256)> {
        let head = self.provider.block_number().await?;
        let block = head.saturating_sub(1);
        let votes = self.governor.get_votes(voter, block).await?;
        Ok((block, votes))
    }

    async fn confirm(&self, action: &'static str, tx: TxHandle) -> DriverResult<Receipt> {
        self.provider
            .wait_for_confirmation(tx)
            .await
            .map_err(|e| tx_failed(action, e).into())
    }
}

/// Log a failed transaction with its decoded revert reason.
fn tx_failed(action: &'static str, err: ChainError) -> ChainError {
    match &err {
        ChainError::Reverted { reason, data } => warn!(
            action,
            reason = reason.as_deref().unwrap_or("unknown"),
            data = %hex::encode(data),
            "transaction reverted"
        ),
        other => warn!(action, error = %other, "transaction failed"),
    }
    err
}
