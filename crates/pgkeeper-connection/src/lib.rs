//! pgkeeper Connection - Resilient connection handling for PostgreSQL
//!
//! This crate keeps a monitoring agent connected through server restarts and
//! network blips: a retrying connector, a per-database connection cache, a
//! bounded pool that can flush itself after a lost connection, and a
//! two-attempt retry session on top of the pool.

mod cache;
mod config;
pub mod pool;
mod postgres;
pub mod reconnect;
mod scoped;
pub mod session;

#[cfg(test)]
mod test_support;

pub use cache::DatabaseCache;
pub use config::KeeperConfig;
pub use pool::{ConnectionPool, Observer, ObserverList, PoolConfig, PoolStats, PooledConnection};
pub use postgres::Postgres;
pub use reconnect::{RetryPolicy, RetryingConnector};
pub use scoped::ScopedConnection;
pub use session::{Attempt, AttemptScope, MAX_ATTEMPTS, RetrySession};

pub(crate) use scoped::close_detached;
