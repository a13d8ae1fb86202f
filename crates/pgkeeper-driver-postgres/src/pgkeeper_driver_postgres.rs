//! PostgreSQL driver implementation

mod connection;
mod connector;
mod error;
mod numeric;
mod values;

pub use connection::PostgresConnection;
pub use connector::PostgresConnector;
