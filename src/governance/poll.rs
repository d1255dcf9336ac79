//! Fixed-interval polling with an optional deadline.
//!
//! Only reads are ever polled. A state-changing transaction is submitted
//! once and never retried, so a failed submission cannot be duplicated.
//!
//! - Probe immediately, then every `interval`
//! - Give up once elapsed time reaches `timeout`; the caller sees
//!   [`PollOutcome::TimedOut`] no later than `timeout + interval`
//! - No timeout means poll forever
//! - A probe error stops the loop and propagates unchanged

use std::future::Future;
use std::time::Duration;

use super::clock::Clock;

/// Result of [`poll_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut { waited: Duration },
}

/// Polling cadence for the lifecycle driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between state reads.
    pub interval: Duration,
    /// How long to wait for a proposal to become Active.
    pub active_timeout: Option<Duration>,
}

/// Default delay between state reads (1 minute).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default wait for the voting period to open (1 hour).
pub const DEFAULT_ACTIVE_TIMEOUT: Duration = Duration::from_secs(3600);

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            active_timeout: Some(DEFAULT_ACTIVE_TIMEOUT),
        }
    }
}

/// Run `probe` until it yields a value or `timeout` elapses.
///
/// `probe` returns `Ok(Some(value))` when done and `Ok(None)` to keep
/// polling.
pub async fn poll_until<C, F, Fut, T, E>(
    clock: &C,
    interval: Duration,
    timeout: Option<Duration>,
    mut probe: F,
) -> Result<PollOutcome<T>, E>
where
    C: Clock + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = clock.now();

    loop {
        if let Some(value) = probe().await? {
            return Ok(PollOutcome::Ready(value));
        }

        let waited = clock.now().saturating_sub(started);
        if timeout.is_some_and(|limit| waited >= limit) {
            return Ok(PollOutcome::TimedOut { waited });
        }

        clock.sleep(interval).await;
    }
}
