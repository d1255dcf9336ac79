//! Governance data model shared by the driver, the RPC backend and the mock.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::abi::IBeraChef;

/// Description used for the friends-of-the-chef proposal.
pub const FRIENDS_OF_THE_CHEF_DESCRIPTION: &str = "Update friends of the chef";

/// Errors constructing a [`ProposalSpec`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    #[error("proposal must contain at least one call")]
    Empty,

    #[error(
        "targets, values and calldatas must have equal length (got {targets}, {values}, {calldatas})"
    )]
    LengthMismatch {
        targets: usize,
        values: usize,
        calldatas: usize,
    },
}

/// A batch of calls submitted to the governor.
///
/// `targets[i]`, `values[i]` and `calldatas[i]` together describe call `i`.
/// The three sequences always have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSpec {
    targets: Vec<Address>,
    values: Vec<U256>,
    calldatas: Vec<Bytes>,
    description: String,
}

impl ProposalSpec {
    pub fn new(
        targets: Vec<Address>,
        values: Vec<U256>,
        calldatas: Vec<Bytes>,
        description: impl Into<String>,
    ) -> Result<Self, SpecError> {
        if targets.len() != values.len() || targets.len() != calldatas.len() {
            return Err(SpecError::LengthMismatch {
                targets: targets.len(),
                values: values.len(),
                calldatas: calldatas.len(),
            });
        }
        if targets.is_empty() {
            return Err(SpecError::Empty);
        }

        Ok(Self {
            targets,
            values,
            calldatas,
            description: description.into(),
        })
    }

    /// Single-call proposal adding (or removing) `vault` from BeraChef's
    /// friends list.
    pub fn update_friends_of_the_chef(chef: Address, vault: Address, is_friend: bool) -> Self {
        let calldata = IBeraChef::updateFriendsOfTheChefCall {
            receiver: vault,
            isFriend: is_friend,
        }
        .abi_encode();

        Self {
            targets: vec![chef],
            values: vec![U256::ZERO],
            calldatas: vec![Bytes::from(calldata)],
            description: FRIENDS_OF_THE_CHEF_DESCRIPTION.to_string(),
        }
    }

    pub fn targets(&self) -> &[Address] {
        &self.targets
    }

    pub fn values(&self) -> &[U256] {
        &self.values
    }

    pub fn calldatas(&self) -> &[Bytes] {
        &self.calldatas
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// keccak256 of the UTF-8 description.
    pub fn description_hash(&self) -> B256 {
        keccak256(self.description.as_bytes())
    }

    /// Proposal id as the governor derives it:
    /// `keccak256(abi.encode(targets, values, calldatas, descriptionHash))`.
    pub fn local_id(&self) -> ProposalId {
        let encoded = (
            self.targets.clone(),
            self.values.clone(),
            self.calldatas.clone(),
            self.description_hash(),
        )
            .abi_encode_params();
        ProposalId(U256::from_be_bytes(keccak256(encoded).0))
    }
}

/// Governor proposal identifier (uint256).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub U256);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Governor proposal state, in the contract's enum order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalState {
    Pending,
    Active,
    Canceled,
    Defeated,
    Succeeded,
    Queued,
    Expired,
    Executed,
}

impl ProposalState {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Pending,
            1 => Self::Active,
            2 => Self::Canceled,
            3 => Self::Defeated,
            4 => Self::Succeeded,
            5 => Self::Queued,
            6 => Self::Expired,
            7 => Self::Executed,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// States with no outgoing transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Canceled | Self::Defeated | Self::Expired | Self::Executed
        )
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Canceled => "Canceled",
            Self::Defeated => "Defeated",
            Self::Succeeded => "Succeeded",
            Self::Queued => "Queued",
            Self::Expired => "Expired",
            Self::Executed => "Executed",
        };
        write!(f, "{} ({})", self.as_u8(), name)
    }
}

/// Vote direction passed to `castVote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteSupport {
    Against = 0,
    For = 1,
    Abstain = 2,
}

impl VoteSupport {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::str::FromStr for VoteSupport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "against" | "0" => Ok(Self::Against),
            "for" | "1" => Ok(Self::For),
            "abstain" | "2" => Ok(Self::Abstain),
            other => Err(format!(
                "Unknown vote support '{}'. Use 'for', 'against' or 'abstain'.",
                other
            )),
        }
    }
}

/// Handle to a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle {
    pub hash: B256,
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)
    }
}

/// Confirmed transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub success: bool,
}

/// Point-in-time view of a voter's governance weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingPowerSnapshot {
    pub balance: U256,
    pub delegatee: Address,
    /// Votes at `block`, always one below the chain head.
    pub votes: U256,
    pub threshold: U256,
    pub block: u64,
}

impl VotingPowerSnapshot {
    pub fn meets_threshold(&self) -> bool {
        self.votes >= self.threshold
    }
}
