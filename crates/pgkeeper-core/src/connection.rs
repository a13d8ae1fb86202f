//! Connection and connector traits

use crate::{ConnectParams, ConnectionStatus, QueryResult, Result, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// A live database connection
///
/// Implementations must report client-side failures (reset socket, closed
/// session) as `KeeperError::Database` with no code, and server rejections
/// with the server's SQLSTATE. The retry layers depend on that distinction.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "postgresql")
    fn driver_name(&self) -> &str;

    /// Execute a statement that returns no rows, yielding the affected row count
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Switch the session in or out of autocommit mode
    ///
    /// The default accepts autocommit and refuses to leave it, which suits
    /// clients that never open implicit transactions.
    async fn set_autocommit(&self, enabled: bool) -> Result<()> {
        if enabled {
            Ok(())
        } else {
            Err(crate::KeeperError::NotSupported(format!(
                "{} connections always run in autocommit mode",
                self.driver_name()
            )))
        }
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;

    /// Cheap, non-blocking health probe.
    ///
    /// Drivers with a native liveness flag should override this. The default
    /// only knows whether `close` was called.
    fn status(&self) -> ConnectionStatus {
        if self.is_closed() {
            ConnectionStatus::Bad
        } else {
            ConnectionStatus::Ok
        }
    }
}

/// The raw connect primitive a driver provides.
///
/// One call is one attempt. Retrying is the caller's business.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new connection with the given parameters
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn Connection>>;
}

#[async_trait]
impl<T: Connector> Connector for Arc<T> {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn Connection>> {
        (**self).connect(params).await
    }
}
