//! Connection pool implementation

use std::collections::{HashMap, VecDeque};
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use pgkeeper_core::{ConnectParams, Connection, KeeperError, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::config::PoolConfig;
use super::observers::ObserverList;
use super::stats::PoolStats;
use crate::reconnect::RetryingConnector;
use crate::session::RetrySession;

/// Idle and borrowed connections, keyed by pool-assigned id.
///
/// A connection is in exactly one of the two sets while the pool tracks it.
/// Borrowed entries own the semaphore permit of their borrow, so dropping an
/// entry frees the slot even if the borrower still holds a stale handle.
#[derive(Default)]
struct PoolState {
    idle: VecDeque<(u64, Arc<dyn Connection>)>,
    in_use: HashMap<u64, Borrowed>,
    closed: bool,
}

struct Borrowed {
    connection: Arc<dyn Connection>,
    _permit: OwnedSemaphorePermit,
}

impl PoolState {
    fn drain_all(&mut self) -> Vec<Arc<dyn Connection>> {
        let mut connections: Vec<_> = self.idle.drain(..).map(|(_, conn)| conn).collect();
        connections.extend(self.in_use.drain().map(|(_, borrowed)| borrowed.connection));
        connections
    }

    fn check_out(&mut self, id: u64, connection: Arc<dyn Connection>, permit: OwnedSemaphorePermit) {
        self.in_use.insert(
            id,
            Borrowed {
                connection,
                _permit: permit,
            },
        );
    }
}

/// Result of looking for an idle connection
enum Checkout {
    /// A healthy idle connection, already moved to the in-use set
    Reused(u64, Arc<dyn Connection>),
    /// Nothing usable was idle, the caller keeps the permit to open one
    Empty(OwnedSemaphorePermit),
}

fn pool_closed() -> KeeperError {
    KeeperError::Pool("connection pool is closed".into())
}

/// A bounded pool of connections to one database
///
/// Borrowers wait when `max_size` connections are out. New connections are
/// opened through a [`RetryingConnector`], so growing the pool rides out the
/// same transient failures as a single connect. A connection is only created
/// when a permit is held and no idle connection is left, which keeps idle plus
/// borrowed at or below `max_size`.
pub struct ConnectionPool {
    /// Pool configuration
    config: PoolConfig,
    /// Parameters for every connection of this pool
    params: ConnectParams,
    /// Connector used to grow the pool
    connector: RetryingConnector,
    /// Callbacks run after connection-loss recovery
    observers: ObserverList,
    /// Idle and borrowed connections
    state: Mutex<PoolState>,
    /// Semaphore to limit borrowed connections
    semaphore: Arc<Semaphore>,
    /// Next connection id
    next_id: AtomicU64,
    /// Number of requests waiting for a connection
    waiting_count: AtomicUsize,
}

impl ConnectionPool {
    /// Create a pool that opens connections on demand
    pub fn new(
        config: PoolConfig,
        params: ConnectParams,
        connector: RetryingConnector,
        observers: ObserverList,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_size()));
        Self {
            config,
            params,
            connector,
            observers,
            state: Mutex::new(PoolState::default()),
            semaphore,
            next_id: AtomicU64::new(0),
            waiting_count: AtomicUsize::new(0),
        }
    }

    /// Create a pool and open `min_size` connections right away
    pub async fn open(
        config: PoolConfig,
        params: ConnectParams,
        connector: RetryingConnector,
        observers: ObserverList,
    ) -> Result<Self> {
        let pool = Self::new(config, params, connector, observers);
        for _ in 0..pool.config.min_size() {
            let conn = pool.connector.connect(&pool.params).await?;
            let id = pool.allocate_id();
            pool.state.lock().idle.push_back((id, conn));
        }
        tracing::debug!(
            dbname = %pool.params.dbname,
            min_size = pool.config.min_size(),
            max_size = pool.config.max_size(),
            "connection pool opened"
        );
        Ok(pool)
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Get a connection from the pool
    ///
    /// This will:
    /// 1. Wait for a free slot, up to the acquire timeout
    /// 2. Reuse an idle connection, skipping broken ones
    /// 3. Otherwise open a new connection
    pub async fn get(&self) -> Result<PooledConnection<'_>> {
        self.waiting_count.fetch_add(1, Ordering::SeqCst);
        let acquired = tokio::time::timeout(
            self.config.acquire_timeout(),
            self.semaphore.clone().acquire_owned(),
        )
        .await;
        self.waiting_count.fetch_sub(1, Ordering::SeqCst);

        let permit = match acquired {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(pool_closed()),
            Err(_) => {
                return Err(KeeperError::Timeout(format!(
                    "Timed out waiting for connection (timeout: {:?})",
                    self.config.acquire_timeout()
                )));
            }
        };

        let (checkout, bad) = self.take_idle(permit)?;
        for (id, conn) in bad {
            tracing::debug!(connection_id = id, "recycling bad idle connection");
            let _ = conn.close().await;
        }

        let (id, connection) = match checkout {
            Checkout::Reused(id, conn) => (id, conn),
            Checkout::Empty(permit) => {
                let conn = self.connector.connect(&self.params).await?;
                let id = self.allocate_id();
                tracing::debug!(dbname = %self.params.dbname, connection_id = id, "opened new pooled connection");

                let closed = {
                    let mut state = self.state.lock();
                    if !state.closed {
                        state.check_out(id, conn.clone(), permit);
                    }
                    state.closed
                };
                if closed {
                    let _ = conn.close().await;
                    return Err(pool_closed());
                }
                (id, conn)
            }
        };

        Ok(PooledConnection {
            id,
            connection: Some(connection),
            pool: self,
        })
    }

    /// Pop idle connections until a healthy one turns up and check it out,
    /// all under one lock. Broken ones are handed back for closing.
    fn take_idle(
        &self,
        permit: OwnedSemaphorePermit,
    ) -> Result<(Checkout, Vec<(u64, Arc<dyn Connection>)>)> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(pool_closed());
        }

        let mut bad = Vec::new();
        while let Some((id, conn)) = state.idle.pop_front() {
            if conn.status().is_ok() {
                state.check_out(id, conn.clone(), permit);
                return Ok((Checkout::Reused(id, conn), bad));
            }
            bad.push((id, conn));
        }
        Ok((Checkout::Empty(permit), bad))
    }

    /// Return a connection to the pool
    ///
    /// Same as dropping it.
    pub fn release(&self, conn: PooledConnection<'_>) {
        debug_assert!(std::ptr::eq(conn.pool, self), "connection released to a foreign pool");
        drop(conn);
    }

    fn return_connection(&self, id: u64, connection: Arc<dyn Connection>) {
        let mut state = self.state.lock();

        // The permit goes back once the connection is idle again.
        let Some(_borrowed) = state.in_use.remove(&id) else {
            // Closed by close_all_keep_open while borrowed.
            tracing::debug!(connection_id = id, "dropping connection closed during recovery");
            return;
        };

        if state.closed || !connection.status().is_ok() {
            drop(state);
            tracing::debug!(connection_id = id, "discarding connection on release");
            crate::close_detached(connection);
            return;
        }

        state.idle.push_back((id, connection));
    }

    /// Close every connection the pool tracks, idle and borrowed, and keep the
    /// pool usable.
    ///
    /// The slots of borrowed connections are freed right away. Their handles
    /// come back as discarded rather than reused, and the next `get` opens a
    /// fresh connection.
    pub async fn close_all_keep_open(&self) {
        let connections = self.state.lock().drain_all();
        tracing::info!(
            dbname = %self.params.dbname,
            count = connections.len(),
            "closing all pooled connections"
        );
        close_all(connections).await;
    }

    /// Run the connection-lost observers in registration order
    pub fn notify_observers(&self) -> Result<()> {
        self.observers.notify()
    }

    /// Start a two-attempt retry session on this pool
    pub fn retry_session(&self) -> RetrySession<'_> {
        RetrySession::new(self)
    }

    /// Tear the pool down. Pending and later borrows fail.
    pub async fn close(&self) {
        let connections = {
            let mut state = self.state.lock();
            state.closed = true;
            state.drain_all()
        };
        self.semaphore.close();
        tracing::debug!(dbname = %self.params.dbname, "connection pool closed");
        close_all(connections).await;
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats::new(
            state.idle.len(),
            state.in_use.len(),
            self.waiting_count.load(Ordering::SeqCst),
        )
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get the parameters new connections are opened with
    pub fn params(&self) -> &ConnectParams {
        &self.params
    }
}

async fn close_all(connections: Vec<Arc<dyn Connection>>) {
    let results = futures::future::join_all(connections.iter().map(|conn| conn.close())).await;
    for err in results.into_iter().filter_map(|r| r.err()) {
        tracing::warn!(error = %err, "failed to close pooled connection");
    }
}

/// A connection borrowed from the pool
///
/// When dropped, the connection is automatically returned to the pool.
pub struct PooledConnection<'a> {
    id: u64,
    connection: Option<Arc<dyn Connection>>,
    pool: &'a ConnectionPool,
}

impl<'a> PooledConnection<'a> {
    /// Pool-assigned connection id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the underlying connection as an Arc
    pub fn inner(&self) -> &Arc<dyn Connection> {
        self.connection.as_ref().expect("connection taken")
    }
}

impl<'a> Deref for PooledConnection<'a> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.inner().as_ref()
    }
}

impl<'a> Drop for PooledConnection<'a> {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            self.pool.return_connection(self.id, conn);
        }
    }
}
