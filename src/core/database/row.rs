//! Row sanitizer: every SQL row becomes a [`Record`] of JSON-safe values.
//!
//! The mapping is: SQL NULL and non-finite floats become `null`; booleans,
//! integers, strings and finite floats pass through; arrays become JSON
//! arrays; anything else (dates, timestamps, numerics, uuids, intervals) is
//! stringified. Types with no decoder are rendered from their raw wire
//! value: enum labels as text, other binary values as `\x`-prefixed hex
//! the way Postgres prints `bytea` and PostGIS prints geometries.

use serde_json::Value;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgRow, PgTypeKind, PgValueFormat, PgValueRef};
use sqlx::types::Uuid;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::warn;

use crate::core::json::{Record, finite_number};

/// A decoded cell, before JSON conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(Value),
    /// A value of some other type, already rendered as a string.
    Other(String),
}

impl SqlValue {
    /// Convert to a JSON-primitive-safe value.
    pub fn into_json(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::from(i),
            Self::Float(f) => finite_number(f),
            Self::Text(s) | Self::Other(s) => Value::String(s),
            Self::Json(v) => v,
        }
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        Self::Other(value.hyphenated().to_string())
    }
}

impl From<PgInterval> for SqlValue {
    fn from(value: PgInterval) -> Self {
        Self::Other(format_interval(&value))
    }
}

/// Postgres-style interval text: `1 mons 2 days 03:04:05.5`.
pub fn format_interval(interval: &PgInterval) -> String {
    let mut parts = Vec::new();
    if interval.months != 0 {
        parts.push(format!("{} mons", interval.months));
    }
    if interval.days != 0 {
        parts.push(format!("{} days", interval.days));
    }
    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let frac = micros % 1_000_000;
        let mut clock = format!("{}{:02}:{:02}:{:02}", sign, secs / 3600, secs / 60 % 60, secs % 60);
        if frac != 0 {
            let digits = format!("{:06}", frac);
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

/// Binary wire bytes as `\x`-prefixed lowercase hex.
pub fn hex_literal(bytes: &[u8]) -> String {
    format!("\\x{}", hex::encode(bytes))
}

fn json_array<T: Into<SqlValue>>(items: Vec<T>) -> SqlValue {
    SqlValue::Json(Value::Array(
        items.into_iter().map(|item| item.into().into_json()).collect(),
    ))
}

/// Build a record from `(column, value)` pairs.
pub fn sanitize<I>(columns: I) -> Record
where
    I: IntoIterator<Item = (String, SqlValue)>,
{
    columns
        .into_iter()
        .map(|(name, value)| (name, value.into_json()))
        .collect()
}

/// Decode a PostgreSQL row into a record, column by column.
pub fn row_to_record(row: &PgRow) -> Record {
    sanitize(row.columns().iter().map(|column| {
        let idx = column.ordinal();
        let value = decode_column(row, idx, column.type_info().name());
        (column.name().to_string(), value)
    }))
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> SqlValue {
    let decoded = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx).map(SqlValue::from),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)
            .map(|v| v.map(i64::from).into()),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)
            .map(|v| v.map(i64::from).into()),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map(SqlValue::from),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)
            .map(|v| v.map(f64::from).into()),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx).map(SqlValue::from),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
            row.try_get::<Option<String>, _>(idx).map(SqlValue::from)
        }
        "NUMERIC" => row
            .try_get::<Option<rust_decimal::Decimal>, _>(idx)
            .map(|v| v.map(|d| SqlValue::Other(d.to_string())).unwrap_or(SqlValue::Null)),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .map(|v| v.map(|d| SqlValue::Other(d.to_string())).unwrap_or(SqlValue::Null)),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .map(|v| v.map(|d| SqlValue::Other(d.to_string())).unwrap_or(SqlValue::Null)),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .map(|v| v.map(|d| SqlValue::Other(d.to_rfc3339())).unwrap_or(SqlValue::Null)),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(idx)
            .map(|v| v.map(SqlValue::Json).unwrap_or(SqlValue::Null)),
        "UUID" => row.try_get::<Option<Uuid>, _>(idx).map(SqlValue::from),
        "INTERVAL" => row.try_get::<Option<PgInterval>, _>(idx).map(SqlValue::from),
        "BOOL[]" => row
            .try_get::<Option<Vec<bool>>, _>(idx)
            .map(|v| v.map(json_array).unwrap_or(SqlValue::Null)),
        "INT2[]" | "INT4[]" | "INT8[]" => row
            .try_get::<Option<Vec<i64>>, _>(idx)
            .or_else(|_| {
                row.try_get::<Option<Vec<i32>>, _>(idx)
                    .map(|v| v.map(|items| items.into_iter().map(i64::from).collect()))
            })
            .or_else(|_| {
                row.try_get::<Option<Vec<i16>>, _>(idx)
                    .map(|v| v.map(|items| items.into_iter().map(i64::from).collect()))
            })
            .map(|v| v.map(json_array).unwrap_or(SqlValue::Null)),
        "FLOAT4[]" | "FLOAT8[]" => row
            .try_get::<Option<Vec<f64>>, _>(idx)
            .or_else(|_| {
                row.try_get::<Option<Vec<f32>>, _>(idx)
                    .map(|v| v.map(|items| items.into_iter().map(f64::from).collect()))
            })
            .map(|v| v.map(json_array).unwrap_or(SqlValue::Null)),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => row
            .try_get::<Option<Vec<String>>, _>(idx)
            .map(|v| v.map(json_array).unwrap_or(SqlValue::Null)),
        "UUID[]" => row
            .try_get::<Option<Vec<Uuid>>, _>(idx)
            .map(|v| v.map(json_array).unwrap_or(SqlValue::Null)),
        _ => {
            let textual = matches!(row.column(idx).type_info().kind(), PgTypeKind::Enum(_));
            row.try_get_raw(idx).map(|raw| raw_value(raw, textual))
        }
    };

    decoded.unwrap_or_else(|e| {
        warn!("Could not decode column {} of type {}: {}", idx, type_name, e);
        SqlValue::Null
    })
}

/// Render a value with no typed decoder from its wire bytes.
fn raw_value(value: PgValueRef<'_>, textual: bool) -> SqlValue {
    if value.is_null() {
        return SqlValue::Null;
    }
    let format = value.format();
    match value.as_bytes() {
        Ok(bytes) => SqlValue::Other(wire_text(format, bytes, textual)),
        Err(e) => {
            warn!("Could not read raw column value: {}", e);
            SqlValue::Null
        }
    }
}

/// Text-format values and binary enum labels are already text; other
/// binary values are hex-encoded.
fn wire_text(format: PgValueFormat, bytes: &[u8], textual: bool) -> String {
    let is_text = textual || matches!(format, PgValueFormat::Text);
    match std::str::from_utf8(bytes) {
        Ok(text) if is_text => text.to_string(),
        _ => hex_literal(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_json_primitives() {
        assert_eq!(SqlValue::Null.into_json(), Value::Null);
        assert_eq!(SqlValue::Bool(true).into_json(), json!(true));
        assert_eq!(SqlValue::Int(42).into_json(), json!(42));
        assert_eq!(SqlValue::Float(0.5).into_json(), json!(0.5));
        assert_eq!(SqlValue::Text("x".into()).into_json(), json!("x"));
        assert_eq!(SqlValue::Other("2024-01-01".into()).into_json(), json!("2024-01-01"));
    }

    #[test]
    fn test_nan_becomes_null() {
        assert_eq!(SqlValue::Float(f64::NAN).into_json(), Value::Null);
        assert_eq!(SqlValue::Float(f64::INFINITY).into_json(), Value::Null);
    }

    #[test]
    fn test_sanitize_keeps_column_order() {
        let record = sanitize(vec![
            ("h3_index".to_string(), SqlValue::Text("8928308280fffff".into())),
            ("dqi".to_string(), SqlValue::Float(f64::NAN)),
            ("year".to_string(), SqlValue::Int(2024)),
        ]);
        let keys: Vec<_> = record.keys().cloned().collect();
        assert_eq!(keys, vec!["h3_index", "dqi", "year"]);
        assert_eq!(record["dqi"], Value::Null);
    }

    #[test]
    fn test_uuid_is_stringified() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let value = SqlValue::from(Some(id));
        assert_eq!(
            value,
            SqlValue::Other("67e55044-10b1-426f-9247-bb680e5fe0c8".to_string())
        );
        assert_eq!(value.into_json(), json!("67e55044-10b1-426f-9247-bb680e5fe0c8"));
    }

    #[test]
    fn test_interval_is_stringified() {
        let interval = PgInterval {
            months: 1,
            days: 2,
            microseconds: 11_045_500_000,
        };
        assert_eq!(
            SqlValue::from(interval),
            SqlValue::Other("1 mons 2 days 03:04:05.5".to_string())
        );
        let zero = PgInterval {
            months: 0,
            days: 0,
            microseconds: 0,
        };
        assert_eq!(format_interval(&zero), "00:00:00");
    }

    #[test]
    fn test_binary_wire_value_is_hex() {
        // 16 raw uuid bytes are not text and must not decode as such
        let bytes = [0x67, 0xe5, 0x50, 0x44, 0x10, 0xb1, 0x42, 0x6f, 0x92, 0x47, 0xbb, 0x68, 0x0e, 0x5f, 0xe0, 0xc8];
        assert_eq!(
            wire_text(PgValueFormat::Binary, &bytes, false),
            "\\x67e5504410b1426f9247bb680e5fe0c8"
        );
        assert_eq!(wire_text(PgValueFormat::Binary, b"abc", false), "\\x616263");
        assert_eq!(wire_text(PgValueFormat::Binary, b"EN", true), "EN");
        assert_eq!(wire_text(PgValueFormat::Text, b"(1,2)", false), "(1,2)");
    }

    #[test]
    fn test_arrays_become_json_arrays() {
        assert_eq!(
            json_array(vec![1.5_f64, f64::NAN]).into_json(),
            json!([1.5, null])
        );
        assert_eq!(
            json_array(vec!["a".to_string(), "b".to_string()]).into_json(),
            json!(["a", "b"])
        );
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3_i64)), SqlValue::Int(3));
    }
}
