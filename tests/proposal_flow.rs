//! Integration test for the end-to-end proposal flow.
//!
//! Runs the whole lifecycle against the in-memory chain:
//! 1. Create a rewards vault for a staking token
//! 2. Self-delegate to reach the proposal threshold
//! 3. Propose adding the vault to the friends of the chef
//! 4. Give up (retryably) while the vote has not opened
//! 5. Re-run: vote, wait for success, queue, sit out the timelock, execute
//! 6. Re-run once more: nothing is resubmitted

use alloy_primitives::{Address, U256};
use govdriver::chain::traits::{GovernanceContract, RewardAllocator};
use govdriver::chain::{MockChain, ProposalSpec, ProposalState, VoteSupport};
use govdriver::governance::{
    DriverError, GovernanceDriver, ManualClock, PollPolicy, RunOutcome,
};
use govdriver::vault::create_rewards_vault;
use std::time::Duration;

type MockDriver = GovernanceDriver<MockChain, MockChain, MockChain, ManualClock>;

const THRESHOLD: u64 = 100;
const TIMELOCK_DELAY: u64 = 7200;

fn chef() -> Address {
    Address::repeat_byte(0xc4)
}

fn setup() -> (MockChain, MockDriver, ManualClock) {
    let chain = MockChain::default();
    chain.set_threshold(U256::from(THRESHOLD));
    chain.set_min_delay(TIMELOCK_DELAY);
    chain.set_balance(chain.sender(), U256::from(150u64));

    let clock = ManualClock::new();
    let driver = GovernanceDriver::new(
        chain.clone(),
        chain.clone(),
        chain.clone(),
        clock.clone(),
        PollPolicy {
            interval: Duration::from_secs(60),
            active_timeout: Some(Duration::from_secs(3600)),
        },
    );
    (chain, driver, clock)
}

#[tokio::test]
async fn test_full_lifecycle_across_reruns() {
    let (chain, driver, clock) = setup();
    let me = chain.sender();

    // 1. Vault
    let token = Address::repeat_byte(0x70);
    let vault = create_rewards_vault(&chain, &chain, token).await.unwrap();
    let spec = ProposalSpec::update_friends_of_the_chef(chef(), vault, true);
    assert!(!chain.is_friend_of_the_chef(vault).await.unwrap());

    // 2-4. First run delegates and proposes, then the vote never opens
    let err = driver.run(&spec, me, VoteSupport::For).await.unwrap_err();
    assert!(err.is_retryable(), "unexpected error: {err}");
    assert!(matches!(
        err,
        DriverError::Timeout {
            target: ProposalState::Active,
            ..
        }
    ));

    let id = spec.local_id();
    assert_eq!(chain.counters().delegations, 1);
    assert_eq!(chain.counters().proposals, 1);
    assert_eq!(chain.counters().votes, 0);
    assert_eq!(chain.state(id).await.unwrap(), ProposalState::Pending);

    // 5. The vote opens and later succeeds
    chain.script_states(
        id,
        vec![
            ProposalState::Active,
            ProposalState::Active,
            ProposalState::Active,
            ProposalState::Succeeded,
        ],
    );
    let slept_before = clock.total_slept();

    let outcome = driver.run(&spec, me, VoteSupport::For).await.unwrap();

    assert_eq!(outcome, RunOutcome::Executed(id));
    assert_eq!(chain.state(id).await.unwrap(), ProposalState::Executed);
    assert!(chain.is_friend_of_the_chef(vault).await.unwrap());
    assert!(clock.total_slept() - slept_before >= Duration::from_secs(TIMELOCK_DELAY));

    let counters = chain.counters();
    assert_eq!(counters.delegations, 1);
    assert_eq!(counters.proposals, 1);
    assert_eq!(counters.votes, 1);
    assert_eq!(counters.queues, 1);
    assert_eq!(counters.executions, 1);

    // 6. Nothing left to submit
    let outcome = driver.run(&spec, me, VoteSupport::For).await.unwrap();
    assert_eq!(outcome, RunOutcome::Executed(id));
    assert_eq!(chain.counters(), counters);
}

#[tokio::test]
async fn test_friends_of_the_chef_proposal_is_resolved_once() {
    let (chain, driver, _) = setup();
    chain.set_delegatee(chain.sender(), chain.sender());
    chain.set_votes(chain.sender(), U256::from(THRESHOLD));

    let vault = Address::repeat_byte(0xa5);
    let first = driver
        .resolve_or_create_proposal(&ProposalSpec::update_friends_of_the_chef(chef(), vault, true))
        .await
        .unwrap();
    let second = driver
        .resolve_or_create_proposal(&ProposalSpec::update_friends_of_the_chef(chef(), vault, true))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(chain.counters().proposals, 1);
}

#[tokio::test]
async fn test_insufficient_power_creates_nothing() {
    let (chain, driver, _) = setup();
    let me = chain.sender();
    chain.set_balance(me, U256::from(50u64));

    let spec = ProposalSpec::update_friends_of_the_chef(chef(), Address::repeat_byte(0xa5), true);
    let outcome = driver.run(&spec, me, VoteSupport::For).await.unwrap();

    match outcome {
        RunOutcome::InsufficientVotingPower(snapshot) => {
            assert_eq!(snapshot.votes, U256::from(50u64));
            assert_eq!(snapshot.delegatee, me);
            assert!(!snapshot.meets_threshold());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(chain.counters().delegations, 1);
    assert_eq!(chain.counters().proposals, 0);
}

#[tokio::test]
async fn test_rerun_after_vote_does_not_vote_again() {
    let (chain, driver, _) = setup();
    let me = chain.sender();
    chain.set_delegatee(me, me);
    chain.set_votes(me, U256::from(THRESHOLD));

    let spec = ProposalSpec::update_friends_of_the_chef(chef(), Address::repeat_byte(0xa5), true);
    let id = chain.insert_proposal(&spec, ProposalState::Active);
    chain.mark_voted(id, me);
    chain.script_states(id, vec![ProposalState::Active, ProposalState::Active, ProposalState::Active, ProposalState::Succeeded]);

    let outcome = driver.run(&spec, me, VoteSupport::Against).await.unwrap();

    assert_eq!(outcome, RunOutcome::Executed(id));
    assert_eq!(chain.counters().votes, 0);
    assert_eq!(chain.counters().executions, 1);
}

#[tokio::test]
async fn test_defeated_proposal_is_closed() {
    let (chain, driver, _) = setup();
    let me = chain.sender();
    chain.set_delegatee(me, me);
    chain.set_votes(me, U256::from(THRESHOLD));

    let spec = ProposalSpec::update_friends_of_the_chef(chef(), Address::repeat_byte(0xa5), true);
    let id = chain.insert_proposal(&spec, ProposalState::Defeated);

    let outcome = driver.run(&spec, me, VoteSupport::For).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Closed {
            id,
            state: ProposalState::Defeated
        }
    );
    assert_eq!(chain.counters().queues, 0);
    assert_eq!(chain.counters().executions, 0);
}
