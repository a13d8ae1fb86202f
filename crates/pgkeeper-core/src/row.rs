//! Typed mapping of result rows
//!
//! Rows come back as `Value`s. These traits turn them into caller types after
//! retrieval, so the connection and pooling layers never deal with row shapes.
//!
//! # Example
//!
//! ```ignore
//! use pgkeeper_core::ConnectionExt;
//!
//! let size: i64 = conn.query_scalar("SELECT pg_database_size($1)", &[dbname]).await?;
//! let rows: Vec<(String, f64)> = conn.query_as("SELECT datname, xact_commit FROM pg_stat_database", &[]).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{Connection, KeeperError, Result, Row, Value};

/// Conversion from a single column value
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T> {
    Err(KeeperError::Decode(format!(
        "expected {expected}, found {}",
        value.type_name()
    )))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_bool().map_or_else(|| mismatch("bool", value), Ok)
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int16(v) => Ok(*v as i32),
            Value::Int32(v) => Ok(*v),
            _ => mismatch("int4", value),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int16(_) | Value::Int32(_) | Value::Int64(_) => {
                value.as_i64().map_or_else(|| mismatch("int8", value), Ok)
            }
            _ => mismatch("int8", value),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(_) | Value::Null => mismatch("float8", value),
            _ => value.as_f64().map_or_else(|| mismatch("float8", value), Ok),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) | Value::Decimal(s) => Ok(s.clone()),
            _ => mismatch("text", value),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            _ => mismatch("json", value),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Conversion from a whole row
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.clone())
    }
}

impl FromRow for HashMap<String, Value> {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.to_map())
    }
}

fn column<T: FromValue>(row: &Row, index: usize) -> Result<T> {
    let value = row.get(index).ok_or_else(|| {
        KeeperError::Decode(format!(
            "row has {} columns, wanted column {}",
            row.len(),
            index + 1
        ))
    })?;
    T::from_value(value)
        .map_err(|e| KeeperError::Decode(format!("column {}: {e}", index + 1)))
}

macro_rules! tuple_from_row {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: FromValue),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> Result<Self> {
                Ok(($(column::<$name>(row, $idx)?,)+))
            }
        }
    };
}

tuple_from_row!(A: 0);
tuple_from_row!(A: 0, B: 1);
tuple_from_row!(A: 0, B: 1, C: 2);
tuple_from_row!(A: 0, B: 1, C: 2, D: 3);

/// Typed query helpers available on every connection
#[async_trait]
pub trait ConnectionExt: Connection {
    /// Run a query and map every row
    async fn query_as<T: FromRow + Send>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        let result = self.query(sql, params).await?;
        result.rows.iter().map(T::from_row).collect()
    }

    /// Run a query and map the first row, if any
    async fn query_one<T: FromRow + Send>(&self, sql: &str, params: &[Value]) -> Result<Option<T>> {
        let result = self.query(sql, params).await?;
        result.rows.first().map(T::from_row).transpose()
    }

    /// Run a query and return the first column of the first row
    async fn query_scalar<T: FromValue + Send>(&self, sql: &str, params: &[Value]) -> Result<T> {
        let result = self.query(sql, params).await?;
        let row = result
            .rows
            .first()
            .ok_or_else(|| KeeperError::Decode("query returned no rows".into()))?;
        column(row, 0)
    }
}

impl<C: Connection + ?Sized> ConnectionExt for C {}
