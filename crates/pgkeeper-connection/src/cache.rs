//! One connection per database name, recycled when it goes bad

use std::collections::HashMap;
use std::sync::Arc;

use pgkeeper_core::{Connection, ConnectionIdentity, Result};

use crate::reconnect::RetryingConnector;

/// Caches at most one open connection per database
///
/// Meant for a single owner running a sequence of probes against several
/// databases of the same server. Dropping the cache closes every connection it
/// holds.
pub struct DatabaseCache {
    /// Identity every cached connection derives from
    identity: ConnectionIdentity,

    /// Connector used on cache misses
    connector: RetryingConnector,

    /// Open connections by database name
    connections: HashMap<String, Arc<dyn Connection>>,
}

impl DatabaseCache {
    /// Create an empty cache
    pub fn new(identity: ConnectionIdentity, connector: RetryingConnector) -> Self {
        Self {
            identity,
            connector,
            connections: HashMap::new(),
        }
    }

    /// The identity connections are opened with
    pub fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    /// Get the connection for `dbname`, the identity's database when `None`.
    ///
    /// A cached connection reporting `Bad` is closed and replaced.
    #[tracing::instrument(skip(self), fields(identity = %self.identity))]
    pub async fn get_connection(&mut self, dbname: Option<&str>) -> Result<Arc<dyn Connection>> {
        let dbname = dbname.unwrap_or(&self.identity.dbname).to_string();

        if let Some(conn) = self.connections.get(&dbname) {
            if conn.status().is_ok() {
                return Ok(conn.clone());
            }
            tracing::debug!(%dbname, "cached connection is bad, reconnecting");
            if let Some(stale) = self.connections.remove(&dbname) {
                if let Err(e) = stale.close().await {
                    tracing::debug!(%dbname, error = %e, "closing stale connection failed");
                }
            }
        }

        let params = self.identity.connect_params(Some(&dbname));
        let conn = self.connector.connect(&params).await?;
        tracing::debug!(%dbname, "cached new connection");
        self.connections.insert(dbname, conn.clone());
        Ok(conn)
    }

    /// Close every cached connection. Calling it again is a no-op.
    pub async fn close_all(&mut self) {
        for (dbname, conn) in self.connections.drain() {
            if let Err(e) = conn.close().await {
                tracing::warn!(%dbname, error = %e, "failed to close cached connection");
            }
        }
    }

    /// Number of cached connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Whether a connection is cached for `dbname`
    pub fn contains(&self, dbname: &str) -> bool {
        self.connections.contains_key(dbname)
    }
}

impl Drop for DatabaseCache {
    fn drop(&mut self) {
        for (_, conn) in self.connections.drain() {
            crate::close_detached(conn);
        }
    }
}

#[cfg(test)]
mod tests;
