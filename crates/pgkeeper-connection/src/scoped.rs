//! A standalone connection closed when it goes out of scope

use std::ops::Deref;
use std::sync::Arc;

use pgkeeper_core::{Connection, Result};

/// A connection that is not pooled or cached.
///
/// Prefer [`ScopedConnection::close`] to observe close errors. Dropping it
/// closes the connection on the current tokio runtime in the background.
pub struct ScopedConnection {
    connection: Option<Arc<dyn Connection>>,
}

impl ScopedConnection {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    /// Get the underlying connection as an Arc
    pub fn inner(&self) -> &Arc<dyn Connection> {
        self.connection.as_ref().expect("connection taken")
    }

    /// Close the connection now
    pub async fn close(mut self) -> Result<()> {
        match self.connection.take() {
            Some(conn) => conn.close().await,
            None => Ok(()),
        }
    }
}

impl Deref for ScopedConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.inner().as_ref()
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            close_detached(conn);
        }
    }
}

/// Close a connection from synchronous code.
///
/// The close runs on the current tokio runtime. Outside a runtime the
/// connection is only dropped, which for most drivers still tears down the
/// socket.
pub(crate) fn close_detached(conn: Arc<dyn Connection>) {
    if conn.is_closed() {
        return;
    }
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = conn.close().await {
                    tracing::debug!(error = %e, "background close failed");
                }
            });
        }
        Err(_) => {
            tracing::debug!("no runtime to close connection on, dropping it");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockConnector, identity};
    use pgkeeper_core::Connector;

    #[tokio::test]
    async fn test_explicit_close() {
        let mock = MockConnector::new();
        let conn = mock.connect(&identity().connect_params(None)).await.unwrap();
        let scoped = ScopedConnection::new(conn);

        assert!(scoped.query("SELECT 1", &[]).await.is_ok());
        scoped.close().await.unwrap();

        assert_eq!(mock.connection(0).close_calls(), 1);
    }

    #[tokio::test]
    async fn test_drop_closes_in_background() {
        let mock = MockConnector::new();
        let conn = mock.connect(&identity().connect_params(None)).await.unwrap();
        drop(ScopedConnection::new(conn));

        tokio::task::yield_now().await;
        assert_eq!(mock.connection(0).close_calls(), 1);
    }
}
