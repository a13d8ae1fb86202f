//! TOML configuration for a [`Postgres`] handle
//!
//! ```toml
//! [postgres]
//! host = "/var/run/postgresql"
//! user = "postgres"
//! dbname = "postgres"
//!
//! [pool]
//! max_size = 4
//!
//! [retry]
//! retries = 10
//! delay_ms = 500
//! ```

use std::path::Path;
use std::sync::Arc;

use pgkeeper_core::{ConnectionIdentity, Connector, KeeperError, Result};
use serde::{Deserialize, Serialize};

use crate::pool::PoolConfig;
use crate::postgres::Postgres;
use crate::reconnect::RetryPolicy;

/// Connection identity, pool sizing and retry policy in one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeeperConfig {
    pub postgres: ConnectionIdentity,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl KeeperConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| KeeperError::Configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.postgres.user.is_empty() {
            return Err(KeeperError::Configuration("postgres.user must be set".into()));
        }
        if self.postgres.dbname.is_empty() {
            return Err(KeeperError::Configuration(
                "postgres.dbname must be set".into(),
            ));
        }
        self.pool.validate()
    }

    /// Build a [`Postgres`] handle connecting through `connector`
    pub fn postgres(&self, connector: Arc<dyn Connector>) -> Postgres {
        Postgres::new(self.postgres.clone(), connector)
            .with_pool_config(self.pool.clone())
            .with_retry_policy(self.retry)
    }
}
