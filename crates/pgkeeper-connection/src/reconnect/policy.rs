//! Fixed-delay retry policy for opening connections

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many times to retry a failed connect, and how long to wait in between.
///
/// A policy of `n` retries allows `n + 1` attempts. The wait comes after each
/// failed attempt except the last one, so the default (30 retries, 1 second)
/// gives up after roughly 30 seconds.
///
/// # Example
///
/// ```
/// use pgkeeper_connection::reconnect::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(2, 500);
/// let waits: Vec<_> = policy.waits().collect();
/// assert_eq!(
///     waits,
///     vec![Duration::from_millis(500), Duration::from_millis(500), Duration::ZERO]
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    #[serde(default = "default_retries")]
    retries: u32,
    /// Delay in milliseconds between two attempts
    #[serde(default = "default_delay_ms")]
    delay_ms: u64,
}

fn default_retries() -> u32 {
    30
}

fn default_delay_ms() -> u64 {
    1_000
}

impl RetryPolicy {
    pub fn new(retries: u32, delay_ms: u64) -> Self {
        Self { retries, delay_ms }
    }

    /// A policy that tries exactly once
    pub fn no_retry() -> Self {
        Self::new(0, 0)
    }

    /// Number of retries after the first attempt
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Total number of attempts, first one included
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay between two attempts
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// The wait that follows each attempt, ending with a zero for the last one.
    ///
    /// [`RetryingConnector`](super::RetryingConnector) walks this schedule, one
    /// attempt per entry.
    pub fn waits(&self) -> impl Iterator<Item = Duration> + use<> {
        std::iter::repeat_n(self.delay(), self.retries as usize).chain(std::iter::once(Duration::ZERO))
    }
}

impl Default for RetryPolicy {
    /// 30 retries, one second apart
    fn default() -> Self {
        Self::new(default_retries(), default_delay_ms())
    }
}
