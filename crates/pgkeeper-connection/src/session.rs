//! Two-attempt retry protocol on top of the pool
//!
//! A [`RetrySession`] hands out at most [`MAX_ATTEMPTS`] attempts. Each attempt
//! borrows a connection for the duration of an [`AttemptScope`]; the caller runs
//! its statements through the scope and passes the outcome to
//! [`AttemptScope::exit`], which decides whether another attempt follows.
//!
//! ```ignore
//! let mut session = pool.retry_session();
//! while let Some(attempt) = session.next_attempt() {
//!     let scope = attempt.enter().await?;
//!     let result = scope.query("SELECT 1", &[]).await;
//!     if let Some(rows) = scope.exit(result).await? {
//!         return Ok(rows);
//!     }
//! }
//! ```

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use pgkeeper_core::{Connection, KeeperError, Result};

use crate::pool::{ConnectionPool, PooledConnection};

/// Attempts made before a connection-level failure is given up on
pub const MAX_ATTEMPTS: usize = 2;

/// Retry state for one logical unit of work
pub struct RetrySession<'p> {
    pool: &'p ConnectionPool,
    attempts: usize,
    finished: bool,
}

impl<'p> RetrySession<'p> {
    pub(crate) fn new(pool: &'p ConnectionPool) -> Self {
        Self {
            pool,
            attempts: 0,
            finished: false,
        }
    }

    /// Attempts started so far
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// The next attempt, or `None` once the session succeeded, failed for good,
    /// or used up its attempts.
    pub fn next_attempt(&mut self) -> Option<Attempt<'_, 'p>> {
        if self.finished || self.attempts >= MAX_ATTEMPTS {
            return None;
        }
        self.attempts += 1;
        Some(Attempt {
            number: self.attempts,
            session: self,
        })
    }

    /// Drive the whole protocol around `op`.
    ///
    /// `op` is called once per attempt with the borrowed connection.
    pub async fn run<T, F, Fut>(mut self, mut op: F) -> Result<T>
    where
        F: FnMut(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        while let Some(attempt) = self.next_attempt() {
            let scope = attempt.enter().await?;
            let result = op(scope.connection().clone()).await;
            if let Some(value) = scope.exit(result).await? {
                return Ok(value);
            }
        }
        Err(KeeperError::Pool("retry session has no attempts left".into()))
    }
}

/// One attempt, not yet holding a connection
pub struct Attempt<'s, 'p> {
    session: &'s mut RetrySession<'p>,
    number: usize,
}

impl<'s, 'p> Attempt<'s, 'p> {
    /// 1-based attempt number
    pub fn number(&self) -> usize {
        self.number
    }

    /// Borrow a connection from the pool for this attempt.
    ///
    /// A failure here ends the session and is returned as is.
    pub async fn enter(self) -> Result<AttemptScope<'s, 'p>> {
        let pool = self.session.pool;
        match pool.get().await {
            Ok(conn) => Ok(AttemptScope {
                session: self.session,
                number: self.number,
                conn,
            }),
            Err(err) => {
                self.session.finished = true;
                Err(err)
            }
        }
    }
}

/// A connection held for the duration of one attempt.
///
/// Dropping the scope without calling [`exit`](Self::exit) returns the
/// connection to the pool.
pub struct AttemptScope<'s, 'p> {
    session: &'s mut RetrySession<'p>,
    number: usize,
    conn: PooledConnection<'p>,
}

impl<'s, 'p> AttemptScope<'s, 'p> {
    /// The borrowed connection
    pub fn connection(&self) -> &Arc<dyn Connection> {
        self.conn.inner()
    }

    /// Close the attempt with the caller's outcome.
    ///
    /// - `Ok(Some(value))`: the attempt succeeded.
    /// - `Ok(None)`: a connection-level failure was absorbed. The pool was
    ///   flushed, observers ran, and another attempt is available.
    /// - `Err(err)`: the failure is final.
    pub async fn exit<T>(self, result: Result<T>) -> Result<Option<T>> {
        let AttemptScope {
            session,
            number,
            conn,
        } = self;
        let pool = session.pool;

        let err = match result {
            Ok(value) => {
                pool.release(conn);
                session.finished = true;
                return Ok(Some(value));
            }
            Err(err) if err.is_connection_level() => err,
            Err(err) => {
                pool.release(conn);
                session.finished = true;
                return Err(err);
            }
        };

        tracing::warn!(attempt = number, error = %err, "connection lost, resetting pool");

        // Closed along with the rest of the pool; the guard then drops as stale.
        pool.close_all_keep_open().await;
        drop(conn);

        if let Err(observer_err) = pool.notify_observers() {
            session.finished = true;
            return Err(observer_err);
        }

        if number >= MAX_ATTEMPTS {
            session.finished = true;
            return Err(err);
        }

        Ok(None)
    }
}

impl Deref for AttemptScope<'_, '_> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        &*self.conn
    }
}
