//! JSON-safe value helpers shared by the SQL row sanitizer and the
//! Parquet column converter.
//!
//! Every value that leaves this crate goes through these helpers so that a
//! `NaN` or infinite float can never reach a serializer as a bare token.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::{Map, Number, Value};

/// One row of any table, keyed by column name in column order.
pub type Record = Map<String, Value>;

/// Convert a float to a JSON number, mapping `NaN` and infinities to `null`.
pub fn finite_number(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

/// Read a numeric field, accepting JSON numbers and numeric strings.
///
/// Numeric database types that were stringified by the row sanitizer
/// (e.g. `NUMERIC`) are still usable for aggregation through this helper.
pub fn as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Subtract two numeric fields with missing values treated as zero.
///
/// Integer inputs stay integers so that counts diff to counts.
pub fn numeric_delta(last: Option<&Value>, first: Option<&Value>) -> Value {
    let as_int = |v: Option<&Value>| match v {
        None | Some(Value::Null) => Some(0),
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    };

    if let (Some(l), Some(f)) = (as_int(last), as_int(first)) {
        return Value::from(l - f);
    }

    finite_number(as_f64(last).unwrap_or(0.0) - as_f64(first).unwrap_or(0.0))
}

/// Round to the given number of decimals, ties to even, on the exact
/// binary value of the float (`round_to(0.03125, 4) == 0.0312`,
/// `round_to(2.675, 2) == 2.67`). Values outside the decimal range fall
/// back to scaling.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let exact = u32::try_from(decimals)
        .ok()
        .zip(Decimal::from_f64_retain(value))
        .and_then(|(dp, d)| {
            d.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven)
                .to_f64()
        });
    exact.unwrap_or_else(|| {
        let factor = 10f64.powi(decimals);
        (value * factor).round_ties_even() / factor
    })
}

/// Truthiness of a field the way the profile narrative needs it:
/// missing, null, empty strings, `false` and zero are all "absent".
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Render a field for a human-readable narrative line.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
