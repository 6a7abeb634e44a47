//! Detail panel for a selected cell.

use serde::Serialize;
use serde_json::Value;

use crate::core::json::Record;

/// Fields shown first, in this order.
pub const DETAIL_METRICS: [&str; 11] = [
    "h3_index",
    "observation_count",
    "species_richness_cell",
    "shannon_H",
    "simpson_1_minus_D",
    "n_threatened_species",
    "threat_score_weighted",
    "n_assessed_species",
    "avg_coordinate_uncertainty_m",
    "pct_uncertainty_gt_10km",
    "dqi",
];

const MISSING: &str = "—";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailField {
    pub name: String,
    pub value: String,
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn format_integer(n: i128) -> String {
    let grouped = group_thousands(&n.unsigned_abs().to_string());
    if n < 0 { format!("-{}", grouped) } else { grouped }
}

fn format_float(f: f64) -> String {
    if !f.is_finite() {
        return MISSING.to_string();
    }
    if f.abs() < 10.0 {
        return format!("{:.4}", f);
    }
    let fixed = format!("{:.1}", f.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "0"));
    let sign = if f < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, group_thousands(whole), frac)
}

/// Human-readable rendering of one field.
pub fn format_metric(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING.to_string(),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                format_integer(i128::from(i))
            } else if let Some(u) = n.as_u64() {
                format_integer(i128::from(u))
            } else {
                n.as_f64().map(format_float).unwrap_or_else(|| MISSING.to_string())
            }
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn lookup<'a>(record: &'a Record, name: &str) -> Option<&'a Value> {
    record.get(name).or_else(|| {
        record
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

/// Fields of a cell: [`DETAIL_METRICS`] first, then every other column
/// that does not start with `_`.
pub fn cell_details(record: &Record) -> Vec<DetailField> {
    let mut fields: Vec<DetailField> = DETAIL_METRICS
        .iter()
        .map(|name| DetailField {
            name: name.to_string(),
            value: format_metric(lookup(record, name)),
        })
        .collect();

    fields.extend(
        record
            .iter()
            .filter(|(k, _)| !k.starts_with('_'))
            .filter(|(k, _)| !DETAIL_METRICS.iter().any(|m| m.eq_ignore_ascii_case(k)))
            .map(|(k, v)| DetailField {
                name: k.clone(),
                value: format_metric(Some(v)),
            }),
    );
    fields
}
