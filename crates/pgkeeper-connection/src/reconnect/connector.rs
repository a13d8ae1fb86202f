//! Connector wrapper that retries failed connects

use std::sync::Arc;

use pgkeeper_core::{ConnectParams, Connection, Connector, Result};

use super::RetryPolicy;

/// Opens connections through a driver's [`Connector`], retrying any failure.
///
/// Every error from the driver is treated as transient. Once the policy is
/// exhausted the last error is returned as is, so callers see the real cause
/// (authentication failure, unknown host, ...) rather than a generic wrapper.
#[derive(Clone)]
pub struct RetryingConnector {
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
}

impl RetryingConnector {
    pub fn new(connector: Arc<dyn Connector>, policy: RetryPolicy) -> Self {
        Self { connector, policy }
    }

    /// The retry policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The underlying single-attempt connector
    pub fn inner(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Open a connection in autocommit mode, retrying per the policy.
    #[tracing::instrument(skip(self, params), fields(host = %params.host, port = params.port, dbname = %params.dbname))]
    pub async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn Connection>> {
        let mut waits = self.policy.waits().peekable();
        let mut attempt = 1;

        loop {
            let wait = waits.next().unwrap_or_default();
            match self.open(params).await {
                Ok(conn) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "connection opened after retrying");
                    }
                    return Ok(conn);
                }
                Err(err) if waits.peek().is_some() => {
                    tracing::debug!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "retrying connection open"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(attempts = attempt, error = %err, "giving up opening connection");
                    return Err(err);
                }
            }
        }
    }

    /// One attempt: connect, then switch to autocommit.
    async fn open(&self, params: &ConnectParams) -> Result<Arc<dyn Connection>> {
        let conn = self.connector.connect(params).await?;
        if let Err(err) = conn.set_autocommit(true).await {
            let _ = conn.close().await;
            return Err(err);
        }
        Ok(conn)
    }
}
