//! Parameter validation shared by every tool.
//!
//! All checks fail with [`ToolError::Validation`], which the invocation
//! layer reports as a re-promptable 400.

use std::collections::HashSet;
use std::sync::LazyLock;

use h3o::{CellIndex, Resolution};
use regex::Regex;
use serde_json::Value;

use super::error::ToolError;

pub const MIN_RESOLUTION: u8 = 6;
pub const MAX_RESOLUTION: u8 = 9;
pub const DEFAULT_RESOLUTION: u8 = 7;
pub const MAX_K_RING: u32 = 3;
pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;
pub const MAX_LOOKBACK_MONTHS: u32 = 60;
pub const MAX_SPECIES: usize = 20;
pub const MAX_CELLS: usize = 100;

static H3_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{8,15}$").expect("h3 pattern is valid"));

/// Read an integer from a JSON number or numeric string. Booleans are rejected.
pub fn parse_integer(value: &Value, field: &str) -> Result<i64, ToolError> {
    let not_integer = || ToolError::validation(format!("{} must be an integer", field));

    let from_float = |f: f64| {
        if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
            Some(f as i64)
        } else {
            None
        }
    };

    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(from_float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(from_float))
        }
        _ => None,
    }
    .ok_or_else(not_integer)
}

fn bounded_integer(
    value: Option<&Value>,
    field: &str,
    min: i64,
    max: i64,
) -> Result<Option<i64>, ToolError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let n = parse_integer(value, field)?;
    if !(min..=max).contains(&n) {
        return Err(ToolError::validation(format!(
            "{} must be between {} and {}",
            field, min, max
        )));
    }
    Ok(Some(n))
}

/// Parse and check a single H3 cell id string.
pub fn parse_cell(raw: &str) -> Result<CellIndex, ToolError> {
    let raw = raw.trim();
    let invalid = || ToolError::validation(format!("Invalid H3 ID format: {}", raw));

    if !H3_PATTERN.is_match(raw) {
        return Err(invalid());
    }
    let bits = u64::from_str_radix(raw, 16).map_err(|_| invalid())?;
    CellIndex::try_from(bits).map_err(|_| invalid())
}

/// Validate the required `h3_id` parameter.
pub fn validate_h3_id(value: Option<&Value>) -> Result<CellIndex, ToolError> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => parse_cell(s),
        _ => Err(ToolError::validation("h3_id must be a non-empty string")),
    }
}

/// Resolution in `[6, 9]`, default 7.
pub fn validate_resolution(value: Option<&Value>) -> Result<u8, ToolError> {
    let res = bounded_integer(
        value,
        "h3_res",
        MIN_RESOLUTION.into(),
        MAX_RESOLUTION.into(),
    )?;
    Ok(res.map_or(DEFAULT_RESOLUTION, |r| r as u8))
}

/// Convert a validated resolution number into the h3o type.
pub fn to_resolution(res: u8) -> Result<Resolution, ToolError> {
    Resolution::try_from(res)
        .map_err(|_| ToolError::validation(format!("h3_res must be between {} and {}", MIN_RESOLUTION, MAX_RESOLUTION)))
}

/// Ring size in `[1, 3]`, default 1.
pub fn validate_k_ring(value: Option<&Value>) -> Result<u32, ToolError> {
    let k = bounded_integer(value, "k_ring", 1, MAX_K_RING.into())?;
    Ok(k.map_or(1, |k| k as u32))
}

/// Year in `[2000, 2100]`; absent means unset.
pub fn validate_year(value: Option<&Value>, field: &str) -> Result<Option<i32>, ToolError> {
    Ok(bounded_integer(value, field, MIN_YEAR.into(), MAX_YEAR.into())?.map(|y| y as i32))
}

/// Lookback window in `[1, 60]` months; absent means unset.
pub fn validate_last_n_months(value: Option<&Value>) -> Result<Option<u32>, ToolError> {
    Ok(bounded_integer(value, "last_n_months", 1, MAX_LOOKBACK_MONTHS.into())?.map(|m| m as u32))
}

/// Expand a list given as one string, the way agents often send it: a
/// string holding a JSON array is that array, any other string is split on
/// commas. Non-string values are returned unchanged.
///
/// Only the tool parsers that accept comma-separated lists call this; the
/// list validators themselves keep a bare string as a single entry.
pub fn split_list_string(value: &Value) -> Value {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(array @ Value::Array(_)) => array,
            _ => Value::Array(
                s.split(',')
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ),
        },
        other => other.clone(),
    }
}

/// Coerce a string or list into a list of trimmed, non-blank strings. A
/// bare string is one entry.
pub fn coerce_string_list(value: &Value, field: &str) -> Result<Vec<String>, ToolError> {
    let items: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        Value::String(_) => vec![value.clone()],
        _ => {
            return Err(ToolError::validation(format!(
                "{} must be a list or string",
                field
            )));
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::String(s) => Some(s.trim().to_string()),
            other => Some(other.to_string()),
        })
        .filter(|s| !s.is_empty())
        .collect())
}

/// Species ids or names: 1 to 20 entries. Absent yields an empty list.
pub fn validate_species_list(value: Option<&Value>, field: &str) -> Result<Vec<String>, ToolError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let out = coerce_string_list(value, field)?;
    if out.is_empty() {
        return Err(ToolError::validation("At least one species ID or name required"));
    }
    if out.len() > MAX_SPECIES {
        return Err(ToolError::validation(format!(
            "Maximum {} species per request",
            MAX_SPECIES
        )));
    }
    Ok(out)
}

/// Cell id list: malformed entries are dropped, duplicates removed keeping
/// the first occurrence, at most 100 valid entries.
pub fn validate_h3_id_list(value: Option<&Value>) -> Result<Vec<CellIndex>, ToolError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };

    let mut seen = HashSet::new();
    let cells: Vec<CellIndex> = coerce_string_list(value, "h3_ids")?
        .iter()
        .filter_map(|raw| parse_cell(raw).ok())
        .filter(|cell| seen.insert(*cell))
        .collect();

    if cells.len() > MAX_CELLS {
        return Err(ToolError::validation(format!(
            "Maximum {} H3 cells per request",
            MAX_CELLS
        )));
    }
    Ok(cells)
}
