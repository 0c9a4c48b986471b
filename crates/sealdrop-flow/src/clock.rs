//! Injectable sleep, so the merge poll can run without real delay in tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real time via `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and records every requested sleep.
#[derive(Debug, Default)]
pub struct ManualClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Simulated time elapsed so far.
    pub fn elapsed(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_records_without_sleeping() {
        let clock = ManualClock::new();
        let started = std::time::Instant::now();
        clock.sleep(Duration::from_secs(3)).await;
        clock.sleep(Duration::from_secs(3)).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(clock.sleeps().len(), 2);
        assert_eq!(clock.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_tokio_clock_sleeps() {
        let started = tokio::time::Instant::now();
        TokioClock.sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
