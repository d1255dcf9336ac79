//! govdriver - Governance Proposal Driver
//!
//! Drives a single Governor proposal through propose, vote, queue, timelock
//! wait and execute against a Berachain-style deployment, and creates
//! rewards vaults through the vault factory.
//!
//! Key principles:
//! - Re-runnable: every step checks on-chain state before submitting
//! - Reads are polled, transactions are never retried
//! - Voting power is always read one block below the head

pub mod chain;
pub mod governance;
pub mod vault;
