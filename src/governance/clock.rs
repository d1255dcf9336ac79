//! Time source for polling loops.
//!
//! The driver never calls `tokio::time` directly; it sleeps through a
//! [`Clock`] so tests can run hour-long polls on virtual time.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since the clock was created.
    fn now(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by tokio's timer.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` returns immediately after advancing time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.inner.lock().unwrap().now += duration;
    }

    /// Every duration passed to `sleep`, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().unwrap().sleeps.clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.inner.lock().unwrap().sleeps.iter().sum()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.inner.lock().unwrap().now
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap();
        state.now += duration;
        state.sleeps.push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_sleep_advances_time() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.sleep(Duration::from_secs(60)).await;
        clock.advance(Duration::from_secs(5));
        clock.sleep(Duration::from_secs(60)).await;

        assert_eq!(clock.now(), Duration::from_secs(125));
        assert_eq!(clock.sleeps().len(), 2);
        assert_eq!(clock.total_slept(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_tokio_clock_follows_runtime_time() {
        let clock = TokioClock::new();
        clock.sleep(Duration::from_millis(20)).await;
        assert!(clock.now() >= Duration::from_millis(20));
    }
}
