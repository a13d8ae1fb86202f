//! In-memory connections and connectors shared by the unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pgkeeper_core::{
    ConnectParams, Connection, ConnectionIdentity, Connector, KeeperError, QueryResult, Result,
    Row, Value,
};

use crate::pool::{ConnectionPool, ObserverList, PoolConfig};
use crate::reconnect::{RetryPolicy, RetryingConnector};

/// Initialize logging for tests if not already initialized
pub(crate) fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("pgkeeper_connection=debug".parse().unwrap()),
            )
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

pub(crate) fn identity() -> ConnectionIdentity {
    ConnectionIdentity::new("localhost", "monitor", "postgres")
}

/// Lazy pool over `mock` that does not retry connects
pub(crate) fn pool(
    mock: &Arc<MockConnector>,
    config: PoolConfig,
    observers: ObserverList,
) -> ConnectionPool {
    ConnectionPool::new(
        config,
        identity().connect_params(None),
        RetryingConnector::new(mock.clone(), RetryPolicy::no_retry()),
        observers,
    )
}

/// Register an observer that counts its calls
pub(crate) fn counting_observer(observers: &ObserverList) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    observers.register(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    calls
}

/// First cell of the first row, as returned by [`MockConnection::query`]
pub(crate) fn returned_id(result: &QueryResult) -> i64 {
    result.rows[0]
        .get(0)
        .and_then(Value::as_i64)
        .expect("mock rows carry an id")
}

/// Mock connection for testing
///
/// Queries containing `syntax error` fail with a server code. Once
/// [`MockConnection::break_link`] is called every query fails without one.
pub(crate) struct MockConnection {
    pub id: usize,
    pub dbname: String,
    closed: AtomicBool,
    broken: AtomicBool,
    close_calls: AtomicUsize,
    autocommit: AtomicBool,
}

impl MockConnection {
    fn new(id: usize, dbname: &str) -> Self {
        Self {
            id,
            dbname: dbname.to_string(),
            closed: AtomicBool::new(false),
            broken: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            autocommit: AtomicBool::new(false),
        }
    }

    /// Simulate the server going away under this connection
    pub fn break_link(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.query(sql, params).await.map(|_| 1)
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        if self.is_closed() {
            return Err(KeeperError::connection("connection already closed"));
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(KeeperError::connection(
                "server closed the connection unexpectedly",
            ));
        }
        if sql.contains("syntax error") {
            return Err(KeeperError::statement("42601", "syntax error at or near \"syntax\""));
        }

        let columns: Arc<[String]> = Arc::from(vec!["id".to_string()]);
        Ok(QueryResult {
            columns: columns.to_vec(),
            rows: vec![Row::new(columns, vec![Value::Int64(self.id as i64)])],
            execution_time_ms: 0,
        })
    }

    async fn set_autocommit(&self, enabled: bool) -> Result<()> {
        self.autocommit.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.broken.load(Ordering::SeqCst)
    }
}

/// Mock connector that counts connections and can be told to fail
#[derive(Default)]
pub(crate) struct MockConnector {
    counter: AtomicUsize,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    connect_delay: Mutex<Duration>,
    created: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `count` connect attempts
    pub fn failing(count: usize) -> Arc<Self> {
        let connector = Self::default();
        connector.failures_left.store(count, Ordering::SeqCst);
        Arc::new(connector)
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = delay;
    }

    /// Number of connect calls, failed ones included
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of connections successfully opened
    pub fn count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn connection(&self, id: usize) -> Arc<MockConnection> {
        self.created
            .lock()
            .iter()
            .find(|conn| conn.id == id)
            .cloned()
            .unwrap_or_else(|| panic!("no connection with id {id}"))
    }

    /// Connections opened and not yet closed
    pub fn open_connections(&self) -> usize {
        self.created
            .lock()
            .iter()
            .filter(|conn| conn.close_calls() == 0)
            .count()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn Connection>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.connect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(KeeperError::connection(format!(
                "connection refused (attempt {attempt})"
            )));
        }

        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        let conn = Arc::new(MockConnection::new(id, &params.dbname));
        self.created.lock().push(conn.clone());
        Ok(conn)
    }
}
