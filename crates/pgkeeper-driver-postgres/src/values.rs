//! Conversions between `Value` and the PostgreSQL wire types

use bytes::BytesMut;
use pgkeeper_core::{DecodeOptions, KeeperError, Result, Value};
use tokio_postgres::Row as PgRow;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

use crate::numeric::{PgNumeric, encode_numeric};

type BoxError = Box<dyn std::error::Error + Sync + Send>;

/// Owned parameter value that tokio-postgres can bind.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Oid(u32),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Binary NUMERIC payload, encoded when the parameter is bound
    Numeric(Vec<u8>),
    Json(serde_json::Value),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
}

impl PgValue {
    /// Convert a `Value` into the variant that matches the prepared parameter
    /// type, so integers and floats go out with the width the server expects.
    ///
    /// Integers that do not fit the target width and text that is not a valid
    /// NUMERIC literal are rejected instead of being sent malformed.
    pub(crate) fn for_type(value: &Value, target_type: &Type) -> Result<Self> {
        let value = match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),

            Value::Int16(v) => Self::coerce_int(*v as i64, target_type)?,
            Value::Int32(v) => Self::coerce_int(*v as i64, target_type)?,
            Value::Int64(v) => Self::coerce_int(*v, target_type)?,

            Value::Float32(v) => match *target_type {
                Type::FLOAT8 => PgValue::Float64(*v as f64),
                Type::NUMERIC => Self::numeric(&float_literal(*v as f64))?,
                _ => PgValue::Float32(*v),
            },
            Value::Float64(v) => match *target_type {
                Type::FLOAT4 => PgValue::Float32(*v as f32),
                Type::NUMERIC => Self::numeric(&float_literal(*v))?,
                _ => PgValue::Float64(*v),
            },

            Value::Decimal(v) => match *target_type {
                Type::FLOAT4 | Type::FLOAT8 => match v.parse::<f64>() {
                    Ok(f) => Self::for_type(&Value::Float64(f), target_type)?,
                    Err(_) => PgValue::String(v.clone()),
                },
                Type::NUMERIC => Self::numeric(v)?,
                _ => PgValue::String(v.clone()),
            },
            Value::String(v) => match *target_type {
                Type::NUMERIC => Self::numeric(v)?,
                _ => PgValue::String(v.clone()),
            },
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Json(v) => PgValue::Json(v.clone()),
            Value::DateTimeUtc(v) => PgValue::DateTimeUtc(*v),
            Value::Date(v) => PgValue::Date(*v),
            Value::Time(v) => PgValue::Time(*v),
            Value::DateTime(v) => PgValue::DateTime(*v),
        };
        Ok(value)
    }

    fn coerce_int(value: i64, target_type: &Type) -> Result<Self> {
        let out_of_range = |_| {
            KeeperError::Decode(format!(
                "integer {value} is out of range for a {} parameter",
                target_type.name()
            ))
        };

        Ok(match *target_type {
            Type::INT2 => PgValue::Int16(i16::try_from(value).map_err(out_of_range)?),
            Type::INT4 => PgValue::Int32(i32::try_from(value).map_err(out_of_range)?),
            Type::OID => PgValue::Oid(u32::try_from(value).map_err(out_of_range)?),
            Type::FLOAT4 => PgValue::Float32(value as f32),
            Type::FLOAT8 => PgValue::Float64(value as f64),
            Type::NUMERIC => Self::numeric(&value.to_string())?,
            _ => PgValue::Int64(value),
        })
    }

    fn numeric(text: &str) -> Result<Self> {
        encode_numeric(text)
            .map(PgValue::Numeric)
            .map_err(|e| KeeperError::Decode(e.to_string()))
    }
}

/// Decimal text for a float, spelling out the special values NUMERIC accepts
fn float_literal(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        value.to_string()
    }
}

impl ToSql for PgValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self {
            PgValue::Null => Ok(IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Oid(v) => v.to_sql(ty, out),
            PgValue::Float32(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Numeric(raw) => {
                out.extend_from_slice(raw);
                Ok(IsNull::No)
            }
            PgValue::Json(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::Time(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

/// Raw payload of a type with no dedicated mapping (enums, `"char"`, ...)
struct PgRaw(Vec<u8>);

impl PgRaw {
    fn into_value(self) -> Value {
        match String::from_utf8(self.0) {
            Ok(text) => Value::String(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        }
    }
}

impl<'a> FromSql<'a> for PgRaw {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(Self(raw.to_vec()))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn column<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Result<Option<T>> {
    row.try_get::<_, Option<T>>(idx).map_err(|e| {
        KeeperError::Decode(format!("column \"{}\": {e}", row.columns()[idx].name()))
    })
}

/// Decode one column of a result row
pub(crate) fn postgres_to_value(row: &PgRow, idx: usize, decode: DecodeOptions) -> Result<Value> {
    let ty = row.columns()[idx].type_();

    let value = match *ty {
        Type::BOOL => column::<bool>(row, idx)?.map(Value::Bool),
        Type::INT2 => column::<i16>(row, idx)?.map(Value::Int16),
        Type::INT4 => column::<i32>(row, idx)?.map(Value::Int32),
        Type::INT8 => column::<i64>(row, idx)?.map(Value::Int64),
        Type::OID => column::<u32>(row, idx)?.map(|v| Value::Int64(v as i64)),
        Type::FLOAT4 => column::<f32>(row, idx)?.map(Value::Float32),
        Type::FLOAT8 => column::<f64>(row, idx)?.map(Value::Float64),
        Type::NUMERIC => column::<PgNumeric>(row, idx)?
            .map(|numeric| numeric_to_value(numeric, decode))
            .transpose()?,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            column::<String>(row, idx)?.map(Value::String)
        }
        Type::BYTEA => column::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        Type::JSON | Type::JSONB => column::<serde_json::Value>(row, idx)?.map(Value::Json),
        Type::DATE => column::<chrono::NaiveDate>(row, idx)?.map(Value::Date),
        Type::TIME => column::<chrono::NaiveTime>(row, idx)?.map(Value::Time),
        Type::TIMESTAMP => column::<chrono::NaiveDateTime>(row, idx)?.map(Value::DateTime),
        Type::TIMESTAMPTZ => {
            column::<chrono::DateTime<chrono::Utc>>(row, idx)?.map(Value::DateTimeUtc)
        }
        _ => column::<PgRaw>(row, idx)?.map(PgRaw::into_value),
    };

    Ok(value.unwrap_or(Value::Null))
}

fn numeric_to_value(numeric: PgNumeric, decode: DecodeOptions) -> Result<Value> {
    if !decode.numeric_as_float {
        return Ok(Value::Decimal(numeric.0));
    }
    numeric
        .to_f64()
        .map(Value::Float64)
        .ok_or_else(|| KeeperError::Decode(format!("NUMERIC {} is not a float", numeric.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bind(value: Value, ty: &Type) -> PgValue {
        PgValue::for_type(&value, ty).unwrap()
    }

    #[test]
    fn test_integers_follow_target_width() {
        assert_eq!(bind(Value::Int64(7), &Type::INT2), PgValue::Int16(7));
        assert_eq!(bind(Value::Int16(7), &Type::INT8), PgValue::Int64(7));
        assert_eq!(bind(Value::Int32(7), &Type::FLOAT8), PgValue::Float64(7.0));
        assert_eq!(bind(Value::Int64(16384), &Type::OID), PgValue::Oid(16384));
    }

    #[test]
    fn test_integers_out_of_range_are_rejected() {
        let err = PgValue::for_type(&Value::Int64(70_000), &Type::INT2).unwrap_err();
        assert!(matches!(err, KeeperError::Decode(_)));
        assert!(err.to_string().contains("70000"));

        assert!(PgValue::for_type(&Value::Int64(i64::from(i32::MAX) + 1), &Type::INT4).is_err());
        assert!(PgValue::for_type(&Value::Int32(-1), &Type::OID).is_err());
        assert!(!err.is_connection_level());
    }

    #[test]
    fn test_floats_follow_target_width() {
        assert_eq!(bind(Value::Float64(1.5), &Type::FLOAT4), PgValue::Float32(1.5));
        assert_eq!(bind(Value::Float32(1.5), &Type::FLOAT8), PgValue::Float64(1.5));
    }

    #[test]
    fn test_decimal_binds_as_float_or_text() {
        assert_eq!(bind(Value::Decimal("2.25".into()), &Type::FLOAT8), PgValue::Float64(2.25));
        assert_eq!(bind(Value::Decimal("2.25".into()), &Type::TEXT), PgValue::String("2.25".into()));
    }

    #[test]
    fn test_numeric_parameters_use_binary_numeric() {
        let two_and_a_quarter = encode_numeric("2.25").unwrap();
        assert_eq!(
            bind(Value::Decimal("2.25".into()), &Type::NUMERIC),
            PgValue::Numeric(two_and_a_quarter.clone())
        );
        assert_eq!(bind(Value::Float64(2.25), &Type::NUMERIC), PgValue::Numeric(two_and_a_quarter));
        assert_eq!(
            bind(Value::Int32(5), &Type::NUMERIC),
            PgValue::Numeric(encode_numeric("5").unwrap())
        );
        assert_eq!(
            bind(Value::Float64(f64::INFINITY), &Type::NUMERIC),
            PgValue::Numeric(encode_numeric("Infinity").unwrap())
        );

        let mut out = BytesMut::new();
        let bound = bind(Value::Int32(5), &Type::NUMERIC);
        assert!(matches!(bound.to_sql(&Type::NUMERIC, &mut out), Ok(IsNull::No)));
        // ndigits 1, weight 0, positive, scale 0, one digit group of 5
        assert_eq!(&out[..], &[0, 1, 0, 0, 0, 0, 0, 0, 0, 5]);
    }

    #[test]
    fn test_invalid_numeric_text_is_rejected() {
        let err = PgValue::for_type(&Value::String("twelve".into()), &Type::NUMERIC).unwrap_err();
        assert!(matches!(err, KeeperError::Decode(_)));
    }

    #[test]
    fn test_numeric_decoding_follows_options() {
        let as_float = DecodeOptions::default();
        let as_text = DecodeOptions {
            numeric_as_float: false,
        };

        assert_eq!(
            numeric_to_value(PgNumeric("12.50".into()), as_float).unwrap(),
            Value::Float64(12.5)
        );
        assert_eq!(
            numeric_to_value(PgNumeric("12.50".into()), as_text).unwrap(),
            Value::Decimal("12.50".into())
        );
    }

    #[test]
    fn test_raw_fallback() {
        assert_eq!(PgRaw(b"running".to_vec()).into_value(), Value::String("running".into()));
        assert_eq!(PgRaw(vec![0xff, 0x00]).into_value(), Value::Bytes(vec![0xff, 0x00]));
    }
}
