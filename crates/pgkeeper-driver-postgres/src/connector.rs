//! Single-attempt connect primitive on top of tokio-postgres

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pgkeeper_core::{ConnectParams, Connection, Connector, Result};
use tokio_postgres::NoTls;

use crate::connection::PostgresConnection;
use crate::error::map_error;

/// Opens plain-text PostgreSQL connections
///
/// Hosts starting with `/` are Unix socket directories. The socket is driven by
/// a task spawned on the calling tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct PostgresConnector {
    connect_timeout: Option<Duration>,
}

impl PostgresConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each connect attempt
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn config(&self, params: &ConnectParams) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&params.host)
            .port(params.port)
            .user(&params.user)
            .dbname(&params.dbname)
            .application_name(&params.application_name);

        if let Some(password) = &params.password {
            config.password(password);
        }
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout(timeout);
        }
        config
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    #[tracing::instrument(skip(self, params), fields(host = %params.host, port = params.port, dbname = %params.dbname))]
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn Connection>> {
        let (client, connection) = self
            .config(params)
            .connect(NoTls)
            .await
            .map_err(map_error)?;

        let driver_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "PostgreSQL connection terminated");
            }
        });

        tracing::debug!("PostgreSQL connection established");
        Ok(Arc::new(PostgresConnection::new(
            client,
            driver_task,
            params.decode,
        )))
    }
}
