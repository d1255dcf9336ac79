//! Chain Trait Abstractions
//!
//! Every contract the driver touches sits behind one of these traits so the
//! driver can run against [`super::mock::MockChain`] in tests and against
//! [`super::rpc::RpcClient`] in production.

use async_trait::async_trait;
use alloy_primitives::{Address, B256, U256};

use super::types::{ProposalId, ProposalSpec, ProposalState, Receipt, TxHandle, VoteSupport};

/// Result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;

/// Chain interface errors.
///
/// Classification happens at the interface boundary: callers branch on the
/// variant, never on message text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The governor has no proposal with this id.
    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    /// A call or transaction reverted.
    #[error("Transaction reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Reverted {
        reason: Option<String>,
        data: Vec<u8>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ChainError {
    /// Revert with a reason decoded from `data`.
    pub fn reverted(data: Vec<u8>) -> Self {
        Self::Reverted {
            reason: super::abi::decode_revert_reason(&data),
            data,
        }
    }
}

/// Node access: block height and transaction confirmation.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Current head block number
    async fn block_number(&self) -> ChainResult<u64>;

    /// Wait until the transaction is mined.
    ///
    /// A mined-but-failed transaction is reported as [`ChainError::Reverted`].
    async fn wait_for_confirmation(&self, tx: TxHandle) -> ChainResult<Receipt>;
}

/// Minimum delay enforced between queue and execute.
#[async_trait]
pub trait TimelockContract: Send + Sync {
    /// Minimum delay in seconds
    async fn min_delay(&self) -> ChainResult<u64>;
}

/// OpenZeppelin-style Governor.
#[async_trait]
pub trait GovernanceContract: Send + Sync {
    type Timelock: TimelockContract;

    async fn hash_proposal(&self, spec: &ProposalSpec) -> ChainResult<ProposalId>;

    /// Current state; [`ChainError::ProposalNotFound`] for unknown ids.
    async fn state(&self, id: ProposalId) -> ChainResult<ProposalState>;

    async fn propose(&self, spec: &ProposalSpec) -> ChainResult<TxHandle>;

    async fn cast_vote(&self, id: ProposalId, support: VoteSupport) -> ChainResult<TxHandle>;

    async fn has_voted(&self, id: ProposalId, voter: Address) -> ChainResult<bool>;

    async fn queue(&self, spec: &ProposalSpec, description_hash: B256) -> ChainResult<TxHandle>;

    async fn execute(&self, spec: &ProposalSpec, description_hash: B256)
        -> ChainResult<TxHandle>;

    /// Blocks between proposal and vote start
    async fn voting_delay(&self) -> ChainResult<U256>;

    /// Blocks the vote stays open
    async fn voting_period(&self) -> ChainResult<U256>;

    async fn proposal_threshold(&self) -> ChainResult<U256>;

    /// Voting power of `voter` at a past block.
    async fn get_votes(&self, voter: Address, block: u64) -> ChainResult<U256>;

    async fn timelock(&self) -> ChainResult<Self::Timelock>;
}

/// Delegable voting token (BGT).
#[async_trait]
pub trait VotingToken: Send + Sync {
    async fn balance_of(&self, account: Address) -> ChainResult<U256>;

    async fn delegates(&self, account: Address) -> ChainResult<Address>;

    async fn delegate(&self, delegatee: Address) -> ChainResult<TxHandle>;
}

/// Deterministic per-token rewards vault deployer.
#[async_trait]
pub trait VaultFactory: Send + Sync {
    async fn create_rewards_vault(&self, token: Address) -> ChainResult<TxHandle>;

    async fn predict_rewards_vault_address(&self, token: Address) -> ChainResult<Address>;
}

/// Reward allocator holding the friends-of-the-chef list.
#[async_trait]
pub trait RewardAllocator: Send + Sync {
    async fn is_friend_of_the_chef(&self, vault: Address) -> ChainResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::abi::IGovernor;
    use alloy_sol_types::SolError;

    #[test]
    fn test_reverted_decodes_reason() {
        let data = IGovernor::GovernorAlreadyCastVote {
            voter: Address::ZERO,
        }
        .abi_encode();

        match ChainError::reverted(data.clone()) {
            ChainError::Reverted { reason, data: raw } => {
                assert!(reason.unwrap().starts_with("GovernorAlreadyCastVote"));
                assert_eq!(raw, data);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_chain_error_display() {
        assert_eq!(
            format!("{}", ChainError::ProposalNotFound(ProposalId(U256::from(7u64)))),
            "Proposal not found: 7"
        );
        assert_eq!(
            format!(
                "{}",
                ChainError::Reverted {
                    reason: None,
                    data: vec![]
                }
            ),
            "Transaction reverted: no reason given"
        );
        assert_eq!(
            format!("{}", ChainError::Transport("connection refused".to_string())),
            "Transport error: connection refused"
        );
    }
}
