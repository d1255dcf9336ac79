//! Chain access layer.
//!
//! - `types`: proposal model shared by every backend
//! - `traits`: async contract interfaces and the typed error taxonomy
//! - `abi`: Solidity ABI definitions and revert decoding
//! - `rpc`: JSON-RPC implementation used in production
//! - `mock`: in-memory chain for tests

pub mod abi;
pub mod mock;
pub mod rpc;
pub mod traits;
pub mod types;

pub use mock::MockChain;
pub use rpc::{RpcClient, RpcSettings};
pub use traits::{
    ChainError, ChainProvider, ChainResult, GovernanceContract, RewardAllocator,
    TimelockContract, VaultFactory, VotingToken,
};
pub use types::{ProposalId, ProposalSpec, ProposalState, VoteSupport};
