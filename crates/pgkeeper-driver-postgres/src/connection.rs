//! PostgreSQL connection implementation

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use pgkeeper_core::{Connection, DecodeOptions, KeeperError, QueryResult, Result, Row, Value};
use tokio::task::JoinHandle;
use tokio_postgres::Client;
use tokio_postgres::types::ToSql;

use crate::error::map_error;
use crate::values::{PgValue, postgres_to_value};

/// PostgreSQL connection wrapper
///
/// tokio-postgres runs in autocommit mode unless a transaction is opened
/// explicitly, so the trait's default `set_autocommit` applies.
pub struct PostgresConnection {
    client: RwLock<Option<Arc<Client>>>,
    /// Task driving the socket, aborted on close
    driver_task: Mutex<Option<JoinHandle<()>>>,
    decode: DecodeOptions,
}

impl PostgresConnection {
    pub(crate) fn new(client: Client, driver_task: JoinHandle<()>, decode: DecodeOptions) -> Self {
        Self {
            client: RwLock::new(Some(Arc::new(client))),
            driver_task: Mutex::new(Some(driver_task)),
            decode,
        }
    }

    fn client(&self) -> Result<Arc<Client>> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| KeeperError::connection("connection already closed"))
    }

    async fn prepare_and_bind(
        &self,
        client: &Client,
        sql: &str,
        params: &[Value],
    ) -> Result<(tokio_postgres::Statement, Vec<PgValue>)> {
        let statement = client.prepare(sql).await.map_err(map_error)?;

        let param_types = statement.params();
        if param_types.len() != params.len() {
            return Err(KeeperError::statement(
                "08P01",
                format!(
                    "statement expects {} parameters, {} given",
                    param_types.len(),
                    params.len()
                ),
            ));
        }

        let pg_params = params
            .iter()
            .zip(param_types)
            .map(|(value, ty)| PgValue::for_type(value, ty))
            .collect::<Result<Vec<_>>>()?;
        Ok((statement, pg_params))
    }
}

fn param_refs(params: &[PgValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement");
        let client = self.client()?;
        let (statement, pg_params) = self.prepare_and_bind(&client, sql, params).await?;

        client
            .execute(&statement, &param_refs(&pg_params))
            .await
            .map_err(map_error)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query");
        let start_time = std::time::Instant::now();
        let client = self.client()?;
        let (statement, pg_params) = self.prepare_and_bind(&client, sql, params).await?;

        let pg_rows = client
            .query(&statement, &param_refs(&pg_params))
            .await
            .map_err(map_error)?;

        // Column names come from the statement so empty results still carry them.
        let columns: Arc<[String]> = statement
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();

        let mut rows = Vec::with_capacity(pg_rows.len());
        for pg_row in &pg_rows {
            let values = (0..columns.len())
                .map(|idx| postgres_to_value(pg_row, idx, self.decode))
                .collect::<Result<Vec<_>>>()?;
            rows.push(Row::new(columns.clone(), values));
        }

        Ok(QueryResult {
            columns: columns.to_vec(),
            rows,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    async fn close(&self) -> Result<()> {
        let client = self.client.write().take();
        if client.is_some() {
            tracing::debug!("closing PostgreSQL connection");
        }
        if let Some(task) = self.driver_task.lock().take() {
            task.abort();
        }
        Ok(())
    }

    /// Also true once the server or the network dropped the session, which is
    /// what the pool's health checks rely on.
    fn is_closed(&self) -> bool {
        self.client
            .read()
            .as_ref()
            .is_none_or(|client| client.is_closed())
    }
}
