use std::time::Duration;

use crate::chain::traits::ChainError;
use crate::chain::types::{ProposalId, ProposalState};

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Lifecycle driver errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// A bounded poll ended before the proposal reached `target`.
    #[error("Proposal {id} did not reach state {target} after {waited:?}; try again later")]
    Timeout {
        id: ProposalId,
        target: ProposalState,
        waited: Duration,
    },

    #[error("Proposal {id} is in state {actual}, expected {expected}")]
    UnexpectedState {
        id: ProposalId,
        expected: ProposalState,
        actual: ProposalState,
    },
}

impl DriverError {
    /// True when re-running later may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    #[test]
    fn test_only_timeout_is_retryable() {
        let id = ProposalId(U256::from(1u64));

        assert!(DriverError::Timeout {
            id,
            target: ProposalState::Active,
            waited: Duration::from_secs(3600),
        }
        .is_retryable());

        assert!(!DriverError::UnexpectedState {
            id,
            expected: ProposalState::Succeeded,
            actual: ProposalState::Defeated,
        }
        .is_retryable());

        assert!(!DriverError::Chain(ChainError::Transport("down".to_string())).is_retryable());
        assert!(!DriverError::Chain(ChainError::ProposalNotFound(id)).is_retryable());
    }

    #[test]
    fn test_timeout_message_asks_for_retry() {
        let err = DriverError::Timeout {
            id: ProposalId(U256::from(5u64)),
            target: ProposalState::Active,
            waited: Duration::from_secs(3600),
        };
        assert_eq!(
            err.to_string(),
            "Proposal 5 did not reach state 1 (Active) after 3600s; try again later"
        );
    }
}
