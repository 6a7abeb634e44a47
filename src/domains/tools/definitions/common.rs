//! Helpers shared by the tool definitions.

use h3o::CellIndex;
use serde_json::Value;

use crate::core::database::{CatalogSession, SqlQuery};
use crate::core::json::{Record, is_truthy};
use crate::domains::tools::error::ToolError;

/// Canonical (lowercase hex) form of a cell id.
pub fn cell_id(cell: CellIndex) -> String {
    cell.to_string()
}

/// Force the species flag columns to booleans.
pub fn coerce_flags(record: &mut Record) {
    for flag in ["is_threatened", "is_invasive"] {
        let truthy = is_truthy(record.get(flag));
        record.insert(flag.to_string(), Value::Bool(truthy));
    }
}

/// Run a single-value `MAX(year) AS max_year` query.
pub async fn max_year(
    session: &mut dyn CatalogSession,
    query: &SqlQuery,
) -> Result<Option<i64>, ToolError> {
    let row = session.fetch_optional(query).await?;
    Ok(row
        .and_then(|r| r.get("max_year").cloned())
        .and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
        .filter(|year| *year != 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_flags() {
        let mut record: Record = serde_json::from_value(json!({
            "is_threatened": 1,
            "species_name": "Lynx pardinus"
        }))
        .unwrap();
        coerce_flags(&mut record);
        assert_eq!(record["is_threatened"], json!(true));
        assert_eq!(record["is_invasive"], json!(false));
    }
}
