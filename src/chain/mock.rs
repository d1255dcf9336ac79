//! Mock Chain for Testing
//!
//! In-memory governor, timelock, voting token, vault factory and reward
//! allocator behind a single cloneable handle. Every submitted transaction is
//! mined immediately in the next block; confirming it advances the head by
//! one more block so past-block vote reads observe the change.

use super::abi::IBeraChef;
use super::traits::*;
use super::types::*;
use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::{SolCall, SolError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Mock chain for testing
#[derive(Clone)]
pub struct MockChain {
    state: Arc<Mutex<MockState>>,
    sender: Address,
}

#[derive(Default)]
struct MockState {
    head: u64,
    next_tx: u64,
    receipts: HashMap<B256, Receipt>,

    proposals: HashMap<ProposalId, MockProposal>,
    voting_delay: U256,
    voting_period: U256,
    threshold: U256,
    min_delay: u64,

    balances: HashMap<Address, U256>,
    delegatees: HashMap<Address, Address>,
    /// (block, votes) checkpoints per account, ascending by block.
    checkpoints: HashMap<Address, Vec<(u64, U256)>>,

    friends: HashSet<Address>,
    vaults: HashMap<Address, Address>,

    state_error: Option<ChainError>,
    revert_next_tx: Option<Vec<u8>>,
    counters: Counters,
}

struct MockProposal {
    spec: ProposalSpec,
    current: ProposalState,
    scripted: VecDeque<ProposalState>,
    voters: HashSet<Address>,
    state_reads: usize,
}

/// Number of transactions of each kind submitted to the mock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub proposals: usize,
    pub votes: usize,
    pub delegations: usize,
    pub queues: usize,
    pub executions: usize,
    pub vault_creations: usize,
}

impl MockChain {
    /// Create a mock chain whose transactions are sent from `sender`.
    pub fn new(sender: Address) -> Self {
        let state = MockState {
            head: 1,
            voting_delay: U256::from(1u64),
            voting_period: U256::from(5u64),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            sender,
        }
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn set_threshold(&self, threshold: U256) {
        self.state.lock().unwrap().threshold = threshold;
    }

    pub fn set_min_delay(&self, seconds: u64) {
        self.state.lock().unwrap().min_delay = seconds;
    }

    pub fn set_balance(&self, account: Address, balance: U256) {
        self.state.lock().unwrap().balances.insert(account, balance);
    }

    /// Record `delegatee` as `account`'s delegate without a transaction.
    pub fn set_delegatee(&self, account: Address, delegatee: Address) {
        self.state
            .lock()
            .unwrap()
            .delegatees
            .insert(account, delegatee);
    }

    /// Checkpoint `votes` for `account` at the last sealed block.
    pub fn set_votes(&self, account: Address, votes: U256) {
        let mut state = self.state.lock().unwrap();
        let block = state.head.saturating_sub(1);
        state.checkpoint(account, block, votes);
    }

    pub fn advance_blocks(&self, blocks: u64) {
        self.state.lock().unwrap().head += blocks;
    }

    pub fn head(&self) -> u64 {
        self.state.lock().unwrap().head
    }

    /// Register an existing proposal in `state`.
    pub fn insert_proposal(&self, spec: &ProposalSpec, state: ProposalState) -> ProposalId {
        let id = spec.local_id();
        self.state
            .lock()
            .unwrap()
            .proposals
            .insert(id, MockProposal::new(spec.clone(), state));
        id
    }

    /// Force the current state of a known proposal.
    pub fn set_state(&self, id: ProposalId, proposal_state: ProposalState) {
        let mut state = self.state.lock().unwrap();
        if let Some(proposal) = state.proposals.get_mut(&id) {
            proposal.current = proposal_state;
            proposal.scripted.clear();
        }
    }

    /// Queue states returned by successive `state` reads. The last scripted
    /// state sticks once the script runs out.
    pub fn script_states(&self, id: ProposalId, states: Vec<ProposalState>) {
        let mut state = self.state.lock().unwrap();
        if let Some(proposal) = state.proposals.get_mut(&id) {
            proposal.scripted.extend(states);
        }
    }

    /// Make every `state` read fail with `error` until cleared.
    pub fn fail_state_reads(&self, error: Option<ChainError>) {
        self.state.lock().unwrap().state_error = error;
    }

    /// Make the next submitted transaction revert with `data`.
    pub fn revert_next_tx(&self, data: Vec<u8>) {
        self.state.lock().unwrap().revert_next_tx = Some(data);
    }

    pub fn mark_voted(&self, id: ProposalId, voter: Address) {
        let mut state = self.state.lock().unwrap();
        if let Some(proposal) = state.proposals.get_mut(&id) {
            proposal.voters.insert(voter);
        }
    }

    pub fn counters(&self) -> Counters {
        self.state.lock().unwrap().counters
    }

    pub fn state_reads(&self, id: ProposalId) -> usize {
        self.state
            .lock()
            .unwrap()
            .proposals
            .get(&id)
            .map(|p| p.state_reads)
            .unwrap_or(0)
    }

    pub fn is_friend(&self, vault: Address) -> bool {
        self.state.lock().unwrap().friends.contains(&vault)
    }

    /// Votes checkpointed for `account` at or before `block`.
    pub fn votes_at(&self, account: Address, block: u64) -> U256 {
        self.state.lock().unwrap().votes_at(account, block)
    }

    fn submit<F>(&self, apply: F) -> ChainResult<TxHandle>
    where
        F: FnOnce(&mut MockState) -> Result<(), Vec<u8>>,
    {
        let mut state = self.state.lock().unwrap();

        if let Some(data) = state.revert_next_tx.take() {
            return Err(ChainError::reverted(data));
        }
        apply(&mut state).map_err(ChainError::reverted)?;

        state.head += 1;
        state.next_tx += 1;
        let hash = keccak256(state.next_tx.to_be_bytes());
        let receipt = Receipt {
            transaction_hash: hash,
            block_number: state.head,
            success: true,
        };
        state.receipts.insert(hash, receipt);

        Ok(TxHandle { hash })
    }
}

impl MockProposal {
    fn new(spec: ProposalSpec, current: ProposalState) -> Self {
        Self {
            spec,
            current,
            scripted: VecDeque::new(),
            voters: HashSet::new(),
            state_reads: 0,
        }
    }
}

impl MockState {
    fn checkpoint(&mut self, account: Address, block: u64, votes: U256) {
        let entries = self.checkpoints.entry(account).or_default();
        entries.retain(|(b, _)| *b < block);
        entries.push((block, votes));
    }

    fn votes_at(&self, account: Address, block: u64) -> U256 {
        self.checkpoints
            .get(&account)
            .and_then(|entries| entries.iter().rev().find(|(b, _)| *b <= block))
            .map(|(_, votes)| *votes)
            .unwrap_or(U256::ZERO)
    }

    fn unexpected_state(id: ProposalId, current: ProposalState) -> Vec<u8> {
        super::abi::IGovernor::GovernorUnexpectedProposalState {
            proposalId: id.0,
            current: current.as_u8(),
            expectedStates: B256::ZERO,
        }
        .abi_encode()
    }

    fn nonexistent(id: ProposalId) -> Vec<u8> {
        super::abi::IGovernor::GovernorNonexistentProposal { proposalId: id.0 }.abi_encode()
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new(Address::repeat_byte(0x11))
    }
}

#[async_trait]
impl ChainProvider for MockChain {
    async fn block_number(&self) -> ChainResult<u64> {
        Ok(self.state.lock().unwrap().head)
    }

    async fn wait_for_confirmation(&self, tx: TxHandle) -> ChainResult<Receipt> {
        let mut state = self.state.lock().unwrap();
        let receipt = state
            .receipts
            .get(&tx.hash)
            .copied()
            .ok_or_else(|| ChainError::Transport(format!("unknown transaction {}", tx.hash)))?;
        state.head += 1;
        Ok(receipt)
    }
}

#[async_trait]
impl TimelockContract for MockChain {
    async fn min_delay(&self) -> ChainResult<u64> {
        Ok(self.state.lock().unwrap().min_delay)
    }
}

#[async_trait]
impl GovernanceContract for MockChain {
    type Timelock = MockChain;

    async fn hash_proposal(&self, spec: &ProposalSpec) -> ChainResult<ProposalId> {
        Ok(spec.local_id())
    }

    async fn state(&self, id: ProposalId) -> ChainResult<ProposalState> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.state_error.clone() {
            return Err(err);
        }
        let proposal = state
            .proposals
            .get_mut(&id)
            .ok_or(ChainError::ProposalNotFound(id))?;

        proposal.state_reads += 1;
        if let Some(next) = proposal.scripted.pop_front() {
            proposal.current = next;
        }
        Ok(proposal.current)
    }

    async fn propose(&self, spec: &ProposalSpec) -> ChainResult<TxHandle> {
        let sender = self.sender;
        let spec = spec.clone();
        self.submit(move |state| {
            let id = spec.local_id();
            if state.proposals.contains_key(&id) {
                return Err(MockState::unexpected_state(id, state.proposals[&id].current));
            }
            let votes = state.votes_at(sender, state.head.saturating_sub(1));
            if votes < state.threshold {
                return Err(super::abi::IGovernor::GovernorInsufficientProposerVotes {
                    proposer: sender,
                    votes,
                    threshold: state.threshold,
                }
                .abi_encode());
            }
            state
                .proposals
                .insert(id, MockProposal::new(spec, ProposalState::Pending));
            state.counters.proposals += 1;
            Ok(())
        })
    }

    async fn cast_vote(&self, id: ProposalId, _support: VoteSupport) -> ChainResult<TxHandle> {
        let sender = self.sender;
        self.submit(move |state| {
            let proposal = state
                .proposals
                .get_mut(&id)
                .ok_or_else(|| MockState::nonexistent(id))?;
            if proposal.current != ProposalState::Active {
                return Err(MockState::unexpected_state(id, proposal.current));
            }
            if !proposal.voters.insert(sender) {
                return Err(
                    super::abi::IGovernor::GovernorAlreadyCastVote { voter: sender }.abi_encode(),
                );
            }
            state.counters.votes += 1;
            Ok(())
        })
    }

    async fn has_voted(&self, id: ProposalId, voter: Address) -> ChainResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .proposals
            .get(&id)
            .map(|p| p.voters.contains(&voter))
            .unwrap_or(false))
    }

    async fn queue(&self, spec: &ProposalSpec, _description_hash: B256) -> ChainResult<TxHandle> {
        let id = spec.local_id();
        self.submit(move |state| {
            let proposal = state
                .proposals
                .get_mut(&id)
                .ok_or_else(|| MockState::nonexistent(id))?;
            if proposal.current != ProposalState::Succeeded {
                return Err(MockState::unexpected_state(id, proposal.current));
            }
            proposal.current = ProposalState::Queued;
            state.counters.queues += 1;
            Ok(())
        })
    }

    async fn execute(
        &self,
        spec: &ProposalSpec,
        _description_hash: B256,
    ) -> ChainResult<TxHandle> {
        let id = spec.local_id();
        self.submit(move |state| {
            let proposal = state
                .proposals
                .get_mut(&id)
                .ok_or_else(|| MockState::nonexistent(id))?;
            if proposal.current != ProposalState::Queued {
                return Err(MockState::unexpected_state(id, proposal.current));
            }
            proposal.current = ProposalState::Executed;

            let friends: Vec<_> = proposal
                .spec
                .calldatas()
                .iter()
                .filter_map(|data| {
                    IBeraChef::updateFriendsOfTheChefCall::abi_decode(data, true).ok()
                })
                .collect();
            for call in friends {
                if call.isFriend {
                    state.friends.insert(call.receiver);
                } else {
                    state.friends.remove(&call.receiver);
                }
            }
            state.counters.executions += 1;
            Ok(())
        })
    }

    async fn voting_delay(&self) -> ChainResult<U256> {
        Ok(self.state.lock().unwrap().voting_delay)
    }

    async fn voting_period(&self) -> ChainResult<U256> {
        Ok(self.state.lock().unwrap().voting_period)
    }

    async fn proposal_threshold(&self) -> ChainResult<U256> {
        Ok(self.state.lock().unwrap().threshold)
    }

    async fn get_votes(&self, voter: Address, block: u64) -> ChainResult<U256> {
        let state = self.state.lock().unwrap();
        if block >= state.head {
            // ERC5805FutureLookup: only past blocks can be queried
            return Err(ChainError::Reverted {
                reason: Some(format!(
                    "ERC5805FutureLookup(timepoint {}, clock {})",
                    block, state.head
                )),
                data: vec![],
            });
        }
        Ok(state.votes_at(voter, block))
    }

    async fn timelock(&self) -> ChainResult<Self::Timelock> {
        Ok(self.clone())
    }
}

#[async_trait]
impl VotingToken for MockChain {
    async fn balance_of(&self, account: Address) -> ChainResult<U256> {
        let state = self.state.lock().unwrap();
        Ok(state.balances.get(&account).copied().unwrap_or(U256::ZERO))
    }

    async fn delegates(&self, account: Address) -> ChainResult<Address> {
        let state = self.state.lock().unwrap();
        Ok(state
            .delegatees
            .get(&account)
            .copied()
            .unwrap_or(Address::ZERO))
    }

    async fn delegate(&self, delegatee: Address) -> ChainResult<TxHandle> {
        let sender = self.sender;
        self.submit(move |state| {
            let balance = state.balances.get(&sender).copied().unwrap_or(U256::ZERO);
            let previous = state.delegatees.insert(sender, delegatee);
            let block = state.head + 1;

            if let Some(previous) = previous.filter(|p| *p != delegatee && !p.is_zero()) {
                let votes = state.votes_at(previous, block).saturating_sub(balance);
                state.checkpoint(previous, block, votes);
            }
            if previous != Some(delegatee) {
                let votes = state.votes_at(delegatee, block) + balance;
                state.checkpoint(delegatee, block, votes);
            }
            state.counters.delegations += 1;
            Ok(())
        })
    }
}

#[async_trait]
impl VaultFactory for MockChain {
    async fn create_rewards_vault(&self, token: Address) -> ChainResult<TxHandle> {
        self.submit(move |state| {
            if state.vaults.contains_key(&token) {
                return Err(alloy_sol_types::Revert {
                    reason: "VaultAlreadyExists".to_string(),
                }
                .abi_encode());
            }
            state.vaults.insert(token, predicted_vault(token));
            state.counters.vault_creations += 1;
            Ok(())
        })
    }

    async fn predict_rewards_vault_address(&self, token: Address) -> ChainResult<Address> {
        Ok(predicted_vault(token))
    }
}

#[async_trait]
impl RewardAllocator for MockChain {
    async fn is_friend_of_the_chef(&self, vault: Address) -> ChainResult<bool> {
        Ok(self.state.lock().unwrap().friends.contains(&vault))
    }
}

fn predicted_vault(token: Address) -> Address {
    Address::from_slice(&keccak256(token.as_slice())[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ProposalSpec {
        ProposalSpec::update_friends_of_the_chef(
            Address::repeat_byte(0xc4),
            Address::repeat_byte(0xa5),
            true,
        )
    }

    #[tokio::test]
    async fn test_unknown_proposal_is_not_found() {
        let chain = MockChain::default();
        let id = spec().local_id();

        let result = chain.state(id).await;
        assert_eq!(result, Err(ChainError::ProposalNotFound(id)));
    }

    #[tokio::test]
    async fn test_scripted_states_then_sticky() {
        let chain = MockChain::default();
        let id = chain.insert_proposal(&spec(), ProposalState::Pending);
        chain.script_states(id, vec![ProposalState::Pending, ProposalState::Active]);

        assert_eq!(chain.state(id).await.unwrap(), ProposalState::Pending);
        assert_eq!(chain.state(id).await.unwrap(), ProposalState::Active);
        assert_eq!(chain.state(id).await.unwrap(), ProposalState::Active);
        assert_eq!(chain.state_reads(id), 3);
    }

    #[tokio::test]
    async fn test_propose_requires_threshold() {
        let chain = MockChain::default();
        chain.set_threshold(U256::from(10u64));

        let err = chain.propose(&spec()).await.unwrap_err();
        match err {
            ChainError::Reverted { reason, .. } => {
                assert!(reason.unwrap().starts_with("GovernorInsufficientProposerVotes"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(chain.counters().proposals, 0);
    }

    #[tokio::test]
    async fn test_self_delegation_checkpoints_balance() {
        let chain = MockChain::default();
        let me = chain.sender();
        chain.set_balance(me, U256::from(50u64));

        let tx = chain.delegate(me).await.unwrap();
        let receipt = chain.wait_for_confirmation(tx).await.unwrap();

        assert!(receipt.success);
        assert_eq!(chain.delegates(me).await.unwrap(), me);
        let head = chain.block_number().await.unwrap();
        assert_eq!(chain.get_votes(me, head - 1).await.unwrap(), U256::from(50u64));
    }

    #[tokio::test]
    async fn test_get_votes_rejects_current_block() {
        let chain = MockChain::default();
        let head = chain.block_number().await.unwrap();

        assert!(chain.get_votes(chain.sender(), head).await.is_err());
    }

    #[tokio::test]
    async fn test_execute_applies_friend_update() {
        let chain = MockChain::default();
        let spec = spec();
        let id = chain.insert_proposal(&spec, ProposalState::Succeeded);

        chain.queue(&spec, spec.description_hash()).await.unwrap();
        chain.execute(&spec, spec.description_hash()).await.unwrap();

        assert_eq!(chain.state(id).await.unwrap(), ProposalState::Executed);
        assert!(chain.is_friend(Address::repeat_byte(0xa5)));
    }

    #[tokio::test]
    async fn test_queue_rejects_wrong_state() {
        let chain = MockChain::default();
        let spec = spec();
        chain.insert_proposal(&spec, ProposalState::Defeated);

        let err = chain.queue(&spec, spec.description_hash()).await.unwrap_err();
        assert!(matches!(err, ChainError::Reverted { .. }));
        assert_eq!(chain.counters().queues, 0);
    }

    #[tokio::test]
    async fn test_vault_created_at_predicted_address() {
        let chain = MockChain::default();
        let token = Address::repeat_byte(0x70);

        let predicted = chain.predict_rewards_vault_address(token).await.unwrap();
        chain.create_rewards_vault(token).await.unwrap();

        assert_eq!(chain.counters().vault_creations, 1);
        assert_eq!(
            chain.predict_rewards_vault_address(token).await.unwrap(),
            predicted
        );
        assert!(chain.create_rewards_vault(token).await.is_err());
    }
}
