//! Error types for pgkeeper

use thiserror::Error;

/// Core error type for pgkeeper operations
#[derive(Error, Debug)]
pub enum KeeperError {
    /// An error reported by the database client library.
    ///
    /// `code` holds the server-assigned SQLSTATE when the server rejected a
    /// statement. It is `None` when the failure happened in the client or on
    /// the wire (refused connection, reset socket, closed session).
    #[error("Database error{}: {message}", .code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Database {
        code: Option<String>,
        message: String,
    },

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Observer failed: {0}")]
    Observer(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl KeeperError {
    /// Build a client-side database error carrying no server code.
    pub fn connection(message: impl Into<String>) -> Self {
        KeeperError::Database {
            code: None,
            message: message.into(),
        }
    }

    /// Build a database error carrying a server-assigned SQLSTATE.
    pub fn statement(code: impl Into<String>, message: impl Into<String>) -> Self {
        KeeperError::Database {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// The SQLSTATE assigned by the server, if any.
    pub fn server_code(&self) -> Option<&str> {
        match self {
            KeeperError::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether this failure means the connection itself is gone.
    ///
    /// Only database-client errors without a server code qualify. Pool,
    /// observer and decoding errors never do, whatever their cause.
    pub fn is_connection_level(&self) -> bool {
        matches!(self, KeeperError::Database { code: None, .. })
    }
}

/// Result type alias for pgkeeper operations
pub type Result<T> = std::result::Result<T, KeeperError>;
