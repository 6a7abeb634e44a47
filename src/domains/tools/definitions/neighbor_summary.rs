//! Aggregated statistics over a set of cells, usually a neighbor ring.

use async_trait::async_trait;
use h3o::CellIndex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use super::common::{cell_id, max_year};
use crate::core::database::{CatalogSession, SchemaName, SqlQuery, Table};
use crate::core::json::{Record, as_f64, finite_number, round_to};
use crate::domains::tools::arguments::Arguments;
use crate::domains::tools::error::ToolError;
use crate::domains::tools::handlers::{BioTool, ToolContext};
use crate::domains::tools::registry::ToolKind;
use crate::domains::tools::validation::{
    split_list_string, validate_h3_id_list, validate_resolution, validate_year,
};

/// Parameters for the neighbor summary tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NeighborSummaryArgs {
    /// H3 cell ids, as a list, a JSON array string or a comma separated string. At most 100.
    pub h3_ids: Vec<String>,

    /// H3 resolution, 6 to 9. Defaults to 7.
    pub h3_res: Option<u8>,

    /// Year to summarize. Defaults to the latest year with data for the cells.
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NeighborSummaryParams {
    pub cells: Vec<CellIndex>,
    pub res: u8,
    pub year: Option<i32>,
}

fn column(rows: &[Record], name: &str) -> Vec<f64> {
    rows.iter().filter_map(|r| as_f64(r.get(name))).collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

fn rounded(value: Option<f64>, decimals: i32) -> Value {
    value.map_or(Value::Null, |v| finite_number(round_to(v, decimals)))
}

/// Sum of the non-null values; stays an integer when every value is one.
fn total(rows: &[Record], name: &str) -> Value {
    let values: Vec<&Value> = rows
        .iter()
        .filter_map(|r| r.get(name))
        .filter(|v| !v.is_null())
        .collect();

    let ints: Option<Vec<i64>> = values.iter().map(|v| v.as_i64()).collect();
    match ints {
        Some(ints) => Value::from(ints.iter().sum::<i64>()),
        None => finite_number(values.iter().filter_map(|v| as_f64(Some(v))).sum()),
    }
}

/// Summary statistics over metric rows.
pub fn summarize(rows: &[Record]) -> Value {
    let richness = column(rows, "species_richness_cell");
    let dqi = column(rows, "dqi");
    let threat = column(rows, "threat_score_weighted");

    json!({
        "mean_richness": rounded(mean(&richness), 2),
        "median_richness": rounded(median(&richness), 2),
        "total_threatened": total(rows, "n_threatened_species"),
        "mean_dqi": rounded(mean(&dqi), 4),
        "mean_threat_score": rounded(mean(&threat), 2),
        "cell_count": rows.len(),
    })
}

/// Neighbor summary tool.
pub struct NeighborSummaryTool;

impl NeighborSummaryTool {
    async fn fetch(
        session: &mut dyn CatalogSession,
        schema: &SchemaName,
        params: &NeighborSummaryParams,
    ) -> Result<(Option<i64>, Vec<Record>), ToolError> {
        let table = Table::CellMetrics.qualified(schema);
        let ids: Vec<String> = params.cells.iter().copied().map(cell_id).collect();

        let year = match params.year {
            Some(year) => Some(i64::from(year)),
            None => {
                let latest = SqlQuery::new(format!(
                    "SELECT MAX(year) AS max_year FROM {} WHERE h3_index = ANY($1) AND h3_resolution = $2",
                    table
                ))
                .bind_text_array(ids.clone())
                .bind_int(params.res);
                max_year(session, &latest).await?
            }
        };

        let mut sql = format!(
            "SELECT * FROM {} WHERE h3_index = ANY($1) AND h3_resolution = $2",
            table
        );
        if year.is_some() {
            sql.push_str(" AND year = $3");
        }
        sql.push_str(" ORDER BY threat_score_weighted DESC NULLS LAST");

        let mut query = SqlQuery::new(sql)
            .bind_text_array(ids)
            .bind_int(params.res);
        if let Some(year) = year {
            query = query.bind_int(year);
        }

        Ok((year, session.fetch_all(&query).await?))
    }
}

#[async_trait]
impl BioTool for NeighborSummaryTool {
    const KIND: ToolKind = ToolKind::NeighborSummary;

    const DESCRIPTION: &'static str = "Summarize biodiversity metrics over a set of H3 cells (mean and median richness, total threatened species, mean data quality, mean threat score) and return every cell ranked by threat score.";

    type Schema = NeighborSummaryArgs;
    type Params = NeighborSummaryParams;

    fn parse(args: &Arguments) -> Result<NeighborSummaryParams, ToolError> {
        Ok(NeighborSummaryParams {
            cells: validate_h3_id_list(args.get("h3_ids").map(split_list_string).as_ref())?,
            res: validate_resolution(args.get("h3_res"))?,
            year: validate_year(args.get("year"), "year")?,
        })
    }

    #[instrument(skip_all, fields(cells = params.cells.len(), res = params.res))]
    async fn execute(params: &NeighborSummaryParams, ctx: &ToolContext) -> Result<Value, ToolError> {
        let ids: Vec<String> = params.cells.iter().copied().map(cell_id).collect();

        if ids.is_empty() {
            return Ok(json!({
                "h3_ids": [],
                "h3_resolution": params.res,
                "summary": null,
                "message": "No valid H3 IDs provided",
            }));
        }

        let mut session = ctx.catalog().session().await?;
        let result = Self::fetch(session.as_mut(), ctx.schema(), params).await;
        session.close().await;
        let (year, ranked_by_threat) = result?;

        if ranked_by_threat.is_empty() {
            info!("No metrics for {} cells", ids.len());
            return Ok(json!({
                "h3_ids": ids,
                "h3_resolution": params.res,
                "year": year,
                "summary": null,
                "top_risky_neighbors": [],
                "message": "No metrics found for given H3 cells",
            }));
        }

        let summary = summarize(&ranked_by_threat);
        Ok(json!({
            "h3_ids": ids,
            "h3_resolution": params.res,
            "year": year,
            "summary": summary,
            "top_risky_neighbors": ranked_by_threat,
        }))
    }
}
