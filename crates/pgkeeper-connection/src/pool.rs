//! Bounded connection pool with connection-loss recovery
//!
//! The pool hands out at most `max_size` connections at a time and keeps
//! returned ones for reuse. When a caller detects that the server dropped its
//! connections, [`ConnectionPool::close_all_keep_open`] closes everything the
//! pool tracks while leaving the pool usable; the next borrow reconnects.
//!
//! # Example
//!
//! ```ignore
//! use pgkeeper_connection::pool::{ConnectionPool, PoolConfig};
//!
//! let pool = ConnectionPool::open(PoolConfig::new(1, 2), params, connector, observers).await?;
//! let conn = pool.get().await?;
//! // Use connection...
//! // Connection returned to pool on drop
//! ```

mod config;
mod observers;
#[allow(clippy::module_inception)]
mod pool;
mod stats;


pub use config::PoolConfig;
pub use observers::{Observer, ObserverList};
pub use pool::{ConnectionPool, PooledConnection};
pub use stats::PoolStats;
