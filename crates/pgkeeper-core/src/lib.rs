//! pgkeeper Core - Core abstractions shared by the pooling layer and drivers
//!
//! This crate provides the fundamental traits and types that all other
//! pgkeeper crates depend on. It defines:
//!
//! - `Connection` - Trait for a live database connection
//! - `Connector` - Trait for the raw connect primitive a driver provides
//! - `ConnectionIdentity` / `ConnectParams` - Who and where to connect
//! - `KeeperError` - The error taxonomy, including connection-level classification
//! - Common types like `Value`, `Row` and the `FromRow` mapping helpers

mod connection;
mod error;
mod identity;
mod row;
mod sql;
mod types;

pub use connection::*;
pub use error::*;
pub use identity::*;
pub use row::*;
pub use sql::*;
pub use types::*;
