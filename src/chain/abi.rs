//! Solidity ABI definitions for the contracts the driver talks to, and
//! decoding of revert payloads into readable reasons.

use alloy_primitives::U256;
use alloy_sol_types::{sol, Panic, Revert, SolError, SolInterface};

sol! {
    interface IGovernor {
        function hashProposal(
            address[] targets,
            uint256[] values,
            bytes[] calldatas,
            bytes32 descriptionHash
        ) external pure returns (uint256 proposalId);

        function state(uint256 proposalId) external view returns (uint8 proposalState);

        function propose(
            address[] targets,
            uint256[] values,
            bytes[] calldatas,
            string description
        ) external returns (uint256 proposalId);

        function castVote(uint256 proposalId, uint8 support) external returns (uint256 weight);

        function hasVoted(uint256 proposalId, address account) external view returns (bool voted);

        function queue(
            address[] targets,
            uint256[] values,
            bytes[] calldatas,
            bytes32 descriptionHash
        ) external returns (uint256 proposalId);

        function execute(
            address[] targets,
            uint256[] values,
            bytes[] calldatas,
            bytes32 descriptionHash
        ) external payable returns (uint256 proposalId);

        function votingDelay() external view returns (uint256 delay);

        function votingPeriod() external view returns (uint256 period);

        function proposalThreshold() external view returns (uint256 threshold);

        function getVotes(address account, uint256 timepoint) external view returns (uint256 votes);

        function timelock() external view returns (address timelockAddress);

        error GovernorNonexistentProposal(uint256 proposalId);
        error GovernorUnexpectedProposalState(uint256 proposalId, uint8 current, bytes32 expectedStates);
        error GovernorInsufficientProposerVotes(address proposer, uint256 votes, uint256 threshold);
        error GovernorAlreadyCastVote(address voter);
        error GovernorInvalidVoteType();
        error GovernorRestrictedProposer(address proposer);
        error GovernorInvalidProposalLength(uint256 targets, uint256 calldatas, uint256 values);
        error GovernorOnlyExecutor(address account);
    }

    interface ITimelock {
        function getMinDelay() external view returns (uint256 minDelay);

        error TimelockUnexpectedOperationState(bytes32 operationId, bytes32 expectedStates);
        error TimelockUnexecutedPredecessor(bytes32 predecessorId);
    }

    interface IVotesToken {
        function balanceOf(address account) external view returns (uint256 balance);

        function delegates(address account) external view returns (address delegatee);

        function delegate(address delegatee) external;
    }

    interface IRewardsVaultFactory {
        function createRewardsVault(address stakingToken) external returns (address vault);

        function predictRewardsVaultAddress(address stakingToken) external view returns (address vault);
    }

    interface IBeraChef {
        function updateFriendsOfTheChef(address receiver, bool isFriend) external;

        function isFriendOfTheChef(address receiver) external view returns (bool isFriend);
    }
}

/// Returns the proposal id if `data` is a `GovernorNonexistentProposal` revert.
pub fn nonexistent_proposal(data: &[u8]) -> Option<U256> {
    IGovernor::GovernorNonexistentProposal::abi_decode(data, true)
        .ok()
        .map(|err| err.proposalId)
}

/// Best-effort human readable reason for a revert payload.
///
/// Known custom errors and the standard `Error(string)`/`Panic(uint256)`
/// payloads are decoded; anything else is rendered as hex. Empty payloads
/// yield `None`.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }

    if let Ok(revert) = Revert::abi_decode(data, true) {
        return Some(revert.reason);
    }
    if let Ok(panic) = Panic::abi_decode(data, true) {
        return Some(format!("panic code {}", panic.code));
    }
    if let Ok(err) = IGovernor::IGovernorErrors::abi_decode(data, true) {
        return Some(describe_governor_error(&err));
    }
    if let Ok(err) = ITimelock::ITimelockErrors::abi_decode(data, true) {
        return Some(match err {
            ITimelock::ITimelockErrors::TimelockUnexpectedOperationState(e) => format!(
                "TimelockUnexpectedOperationState(operation {}, expected {})",
                e.operationId, e.expectedStates
            ),
            ITimelock::ITimelockErrors::TimelockUnexecutedPredecessor(e) => {
                format!("TimelockUnexecutedPredecessor({})", e.predecessorId)
            }
        });
    }

    Some(format!("unknown revert 0x{}", hex::encode(data)))
}

fn describe_governor_error(err: &IGovernor::IGovernorErrors) -> String {
    use IGovernor::IGovernorErrors as E;

    match err {
        E::GovernorNonexistentProposal(e) => {
            format!("GovernorNonexistentProposal({})", e.proposalId)
        }
        E::GovernorUnexpectedProposalState(e) => format!(
            "GovernorUnexpectedProposalState(proposal {}, current state {}, expected mask {})",
            e.proposalId, e.current, e.expectedStates
        ),
        E::GovernorInsufficientProposerVotes(e) => format!(
            "GovernorInsufficientProposerVotes(proposer {}, votes {}, threshold {})",
            e.proposer, e.votes, e.threshold
        ),
        E::GovernorAlreadyCastVote(e) => format!("GovernorAlreadyCastVote({})", e.voter),
        E::GovernorInvalidVoteType(_) => "GovernorInvalidVoteType()".to_string(),
        E::GovernorRestrictedProposer(e) => {
            format!("GovernorRestrictedProposer({})", e.proposer)
        }
        E::GovernorInvalidProposalLength(e) => format!(
            "GovernorInvalidProposalLength(targets {}, calldatas {}, values {})",
            e.targets, e.calldatas, e.values
        ),
        E::GovernorOnlyExecutor(e) => format!("GovernorOnlyExecutor({})", e.account),
    }
}
