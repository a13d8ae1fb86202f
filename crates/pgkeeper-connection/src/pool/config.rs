//! Pool configuration types

use std::time::Duration;

use pgkeeper_core::{KeeperError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a connection pool
///
/// Controls pool sizing and how long a borrower waits for a free connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of connections opened up front by `ConnectionPool::open`
    #[serde(default = "default_min_size")]
    min_size: usize,
    /// Maximum number of connections, idle and borrowed together
    #[serde(default = "default_max_size")]
    max_size: usize,
    /// Timeout in milliseconds when acquiring a connection from the pool
    #[serde(default = "default_acquire_timeout_ms")]
    acquire_timeout_ms: u64,
}

fn default_min_size() -> usize {
    1
}

fn default_max_size() -> usize {
    2
}

fn default_acquire_timeout_ms() -> u64 {
    30_000
}

impl PoolConfig {
    /// Create a new pool configuration with the given min and max sizes
    ///
    /// # Panics
    ///
    /// Panics if `min_size > max_size` or if `max_size` is 0.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        let config = Self {
            min_size,
            max_size,
            acquire_timeout_ms: default_acquire_timeout_ms(),
        };
        if let Err(e) = config.validate() {
            panic!("{e}");
        }
        config
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Check the sizing, for configurations that did not come through `new`
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(KeeperError::Configuration(
                "max_size must be greater than 0".into(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(KeeperError::Configuration(format!(
                "min_size ({}) cannot exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }

    /// Get the minimum pool size
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - min_size: 1
    /// - max_size: 2
    /// - acquire_timeout: 30 seconds
    fn default() -> Self {
        Self::new(default_min_size(), default_max_size())
    }
}
