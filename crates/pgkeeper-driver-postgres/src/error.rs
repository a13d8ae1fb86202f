//! Mapping of tokio-postgres errors onto `KeeperError`

use pgkeeper_core::KeeperError;

/// Render a server error with its detail, hint and column, or the client
/// error as is.
pub(crate) fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();

    if let Some(detail) = db_error.detail() {
        if !detail.trim().is_empty() {
            message.push_str(&format!(" (detail: {})", detail));
        }
    }

    if let Some(hint) = db_error.hint() {
        if !hint.trim().is_empty() {
            message.push_str(&format!(" (hint: {})", hint));
        }
    }

    if let Some(column) = db_error.column() {
        if !column.trim().is_empty() {
            message.push_str(&format!(" (column: {})", column));
        }
    }

    message
}

/// Server rejections keep their SQLSTATE. Everything else, a reset socket or
/// a closed session included, carries no code and counts as connection-level.
pub(crate) fn map_error(error: tokio_postgres::Error) -> KeeperError {
    KeeperError::Database {
        code: error.code().map(|state| state.code().to_string()),
        message: format_postgres_error(&error),
    }
}
