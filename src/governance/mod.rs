//! Proposal lifecycle orchestration.
//!
//! Lifecycle: Pending -> Active -> {Succeeded | Defeated | Canceled},
//! Succeeded -> Queued -> {Executed | Expired}. The driver only ever waits
//! for Active (to vote) and Succeeded (to queue).

pub mod clock;
pub mod driver;
pub mod error;
pub mod poll;

pub use clock::{Clock, ManualClock, TokioClock};
pub use driver::{GovernanceDriver, RunOutcome, VoteOutcome};
pub use error::{DriverError, DriverResult};
pub use poll::{poll_until, PollOutcome, PollPolicy};
