//! Entry point tying identity, connector and policies together

use std::sync::Arc;

use pgkeeper_core::{ConnectionIdentity, Connector, IdentityOverrides, Result};

use crate::cache::DatabaseCache;
use crate::pool::{ConnectionPool, ObserverList, PoolConfig};
use crate::reconnect::{RetryPolicy, RetryingConnector};
use crate::scoped::ScopedConnection;

/// Handle on one PostgreSQL server for one role
///
/// Every cache, pool and connection it hands out shares its connector and
/// retry policy. Pools additionally share its connection-lost observers.
#[derive(Clone)]
pub struct Postgres {
    identity: ConnectionIdentity,
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    pool_config: PoolConfig,
    observers: ObserverList,
}

impl Postgres {
    /// Create a handle with the default retry policy and pool sizing
    pub fn new(identity: ConnectionIdentity, connector: Arc<dyn Connector>) -> Self {
        Self {
            identity,
            connector,
            retry: RetryPolicy::default(),
            pool_config: PoolConfig::default(),
            observers: ObserverList::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pool_config(mut self, pool_config: PoolConfig) -> Self {
        self.pool_config = pool_config;
        self
    }

    pub fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn pool_config(&self) -> &PoolConfig {
        &self.pool_config
    }

    pub fn observers(&self) -> &ObserverList {
        &self.observers
    }

    /// A handle on another database or role of the same server.
    ///
    /// The connector and policies carry over. The observer list starts empty.
    pub fn derive(&self, overrides: IdentityOverrides) -> Self {
        Self {
            identity: self.identity.derive(overrides),
            connector: self.connector.clone(),
            retry: self.retry,
            pool_config: self.pool_config.clone(),
            observers: ObserverList::new(),
        }
    }

    /// Register a callback run after a pool recovers from a lost connection
    pub fn add_connection_lost_observer<F>(&self, observer: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observers.register(observer);
    }

    fn retrying_connector(&self) -> RetryingConnector {
        RetryingConnector::new(self.connector.clone(), self.retry)
    }

    /// A per-database connection cache
    pub fn cache(&self) -> DatabaseCache {
        DatabaseCache::new(self.identity.clone(), self.retrying_connector())
    }

    /// A pool on the identity's database that connects on first use
    pub fn pool(&self) -> ConnectionPool {
        ConnectionPool::new(
            self.pool_config.clone(),
            self.identity.connect_params(None),
            self.retrying_connector(),
            self.observers.clone(),
        )
    }

    /// A pool on the identity's database with `min_size` connections already open
    pub async fn open_pool(&self) -> Result<ConnectionPool> {
        ConnectionPool::open(
            self.pool_config.clone(),
            self.identity.connect_params(None),
            self.retrying_connector(),
            self.observers.clone(),
        )
        .await
    }

    /// One standalone connection, retried per the policy
    pub async fn connect(&self) -> Result<ScopedConnection> {
        let conn = self
            .retrying_connector()
            .connect(&self.identity.connect_params(None))
            .await?;
        Ok(ScopedConnection::new(conn))
    }
}

impl std::fmt::Display for Postgres {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Postgres on {}", self.identity)
    }
}

impl std::fmt::Debug for Postgres {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Postgres")
            .field("identity", &self.identity)
            .field("retry", &self.retry)
            .field("pool_config", &self.pool_config)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}
