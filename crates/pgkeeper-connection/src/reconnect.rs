//! Bounded retry around connection establishment
//!
//! Servers restart and networks blip. The connector here keeps trying for a
//! bounded time before it surfaces the failure.
//!
//! # Example
//!
//! ```ignore
//! use pgkeeper_connection::reconnect::{RetryPolicy, RetryingConnector};
//!
//! let connector = RetryingConnector::new(Arc::new(PostgresConnector::new()), RetryPolicy::default());
//! let conn = connector.connect(&identity.connect_params(None)).await?;
//! ```

mod connector;
mod policy;


pub use connector::RetryingConnector;
pub use policy::RetryPolicy;
