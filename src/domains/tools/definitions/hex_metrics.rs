//! Single-cell metrics tool.
//!
//! Returns every yearly metrics row of one cell, optionally restricted to a
//! year window, plus a first-to-last trend when at least two rows exist.

use async_trait::async_trait;
use chrono::Datelike;
use h3o::CellIndex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use super::common::cell_id;
use crate::core::database::{CatalogSession, SchemaName, SqlQuery, Table};
use crate::core::json::{Record, as_f64, numeric_delta, round_to};
use crate::domains::tools::arguments::Arguments;
use crate::domains::tools::error::ToolError;
use crate::domains::tools::handlers::{BioTool, ToolContext};
use crate::domains::tools::registry::ToolKind;
use crate::domains::tools::validation::{
    MIN_YEAR, validate_h3_id, validate_last_n_months, validate_resolution, validate_year,
};

// ============================================================================
// Tool Parameters
// ============================================================================

/// Parameters for the hex metrics tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct HexMetricsArgs {
    /// H3 cell id (8-15 hex characters).
    pub h3_id: String,

    /// H3 resolution, 6 to 9. Defaults to 7.
    pub h3_res: Option<u8>,

    /// First year of the window (alias: start_year).
    pub time_start: Option<i32>,

    /// Last year of the window (alias: end_year).
    pub time_end: Option<i32>,

    /// Look back this many months from the current year (1-60). Overrides the explicit window.
    pub last_n_months: Option<u32>,
}

/// Validated parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct HexMetricsParams {
    pub cell: CellIndex,
    pub res: u8,
    /// Inclusive year window, if any.
    pub years: Option<(i32, i32)>,
}

/// Resolve the year window from the optional bounds and lookback.
///
/// The lookback wins when set. An explicit window with one bound missing
/// is completed with 2000 or the current year.
pub fn year_window(
    start: Option<i32>,
    end: Option<i32>,
    last_n_months: Option<u32>,
    current_year: i32,
) -> Option<(i32, i32)> {
    if let Some(months) = last_n_months {
        let start = current_year - (months / 12) as i32 - 1;
        return Some((start.max(MIN_YEAR), current_year));
    }
    if start.is_some() || end.is_some() {
        return Some((start.unwrap_or(MIN_YEAR), end.unwrap_or(current_year)));
    }
    None
}

/// First-to-last change over the ordered rows; `null` with fewer than two.
pub fn compute_trend(rows: &[Record]) -> Value {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return Value::Null;
    };
    if rows.len() < 2 {
        return Value::Null;
    }

    let dqi_change = as_f64(last.get("dqi")).unwrap_or(0.0) - as_f64(first.get("dqi")).unwrap_or(0.0);

    json!({
        "species_richness_change": numeric_delta(
            last.get("species_richness_cell"),
            first.get("species_richness_cell"),
        ),
        "threatened_change": numeric_delta(
            last.get("n_threatened_species"),
            first.get("n_threatened_species"),
        ),
        "dqi_change": round_to(dqi_change, 4),
    })
}

fn metrics_query(schema: &SchemaName, params: &HexMetricsParams) -> SqlQuery {
    let mut sql = format!(
        "SELECT * FROM {} WHERE h3_index = $1 AND h3_resolution = $2",
        Table::CellMetrics.qualified(schema)
    );
    if params.years.is_some() {
        sql.push_str(" AND year BETWEEN $3 AND $4");
    }
    sql.push_str(" ORDER BY year");

    let query = SqlQuery::new(sql)
        .bind_text(cell_id(params.cell))
        .bind_int(params.res);
    match params.years {
        Some((start, end)) => query.bind_int(start).bind_int(end),
        None => query,
    }
}

// ============================================================================
// Tool Definition
// ============================================================================

/// Hex metrics tool - yearly biodiversity indices for one cell.
pub struct HexMetricsTool;

impl HexMetricsTool {
    async fn fetch(
        session: &mut dyn CatalogSession,
        schema: &SchemaName,
        params: &HexMetricsParams,
    ) -> Result<Vec<Record>, ToolError> {
        Ok(session.fetch_all(&metrics_query(schema, params)).await?)
    }
}

#[async_trait]
impl BioTool for HexMetricsTool {
    const KIND: ToolKind = ToolKind::HexMetrics;

    const DESCRIPTION: &'static str = "Get biodiversity metrics (species richness, Shannon and Simpson diversity, threatened species, threat score, data quality) for one H3 cell, one row per year, with a first-to-last trend.";

    type Schema = HexMetricsArgs;
    type Params = HexMetricsParams;

    fn parse(args: &Arguments) -> Result<HexMetricsParams, ToolError> {
        let cell = validate_h3_id(args.get("h3_id"))?;
        let res = validate_resolution(args.get("h3_res"))?;
        let start = validate_year(
            args.get("time_start").or_else(|| args.get("start_year")),
            "time_start",
        )?;
        let end = validate_year(
            args.get("time_end").or_else(|| args.get("end_year")),
            "time_end",
        )?;
        let last_n = validate_last_n_months(args.get("last_n_months"))?;

        let current_year = chrono::Utc::now().year();
        Ok(HexMetricsParams {
            cell,
            res,
            years: year_window(start, end, last_n, current_year),
        })
    }

    #[instrument(skip_all, fields(h3_id = %params.cell, res = params.res))]
    async fn execute(params: &HexMetricsParams, ctx: &ToolContext) -> Result<Value, ToolError> {
        info!("Hex metrics requested, window {:?}", params.years);

        let mut session = ctx.catalog().session().await?;
        let result = Self::fetch(session.as_mut(), ctx.schema(), params).await;
        session.close().await;
        let metrics = result?;

        debug!("Fetched {} metric rows", metrics.len());
        let trend = compute_trend(&metrics);

        Ok(json!({
            "h3_id": cell_id(params.cell),
            "h3_resolution": params.res,
            "metrics": metrics,
            "trend": trend,
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::BindValue;
    use crate::core::database::catalog::testing::FakeCatalog;
    use std::sync::Arc;

    const CELL: &str = "8928308280fffff";

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn args(value: Value) -> Arguments {
        Arguments::from_object(value.as_object().unwrap())
    }

    #[test]
    fn test_year_window() {
        assert_eq!(year_window(None, None, None, 2026), None);
        assert_eq!(year_window(None, None, Some(24), 2026), Some((2023, 2026)));
        assert_eq!(year_window(None, None, Some(11), 2026), Some((2025, 2026)));
        assert_eq!(year_window(Some(2010), None, Some(6), 2026), Some((2025, 2026)));
        assert_eq!(year_window(Some(2010), None, None, 2026), Some((2010, 2026)));
        assert_eq!(year_window(None, Some(2015), None, 2026), Some((2000, 2015)));
        assert_eq!(year_window(None, None, Some(60), 2004), Some((2000, 2004)));
    }

    #[test]
    fn test_trend_needs_two_rows() {
        assert_eq!(compute_trend(&[]), Value::Null);
        assert_eq!(
            compute_trend(&[record(json!({"species_richness_cell": 3}))]),
            Value::Null
        );
    }

    #[test]
    fn test_trend_deltas() {
        let rows = vec![
            record(json!({"year": 2020, "species_richness_cell": 10, "n_threatened_species": 2, "dqi": 0.5})),
            record(json!({"year": 2021, "species_richness_cell": 12, "n_threatened_species": null, "dqi": null})),
            record(json!({"year": 2022, "species_richness_cell": 15, "n_threatened_species": 1, "dqi": 0.62346})),
        ];
        let trend = compute_trend(&rows);
        assert_eq!(trend["species_richness_change"], json!(5));
        assert_eq!(trend["threatened_change"], json!(-1));
        assert_eq!(trend["dqi_change"], json!(0.1235));
    }

    #[test]
    fn test_parse_accepts_aliases() {
        let params = HexMetricsTool::parse(&args(json!({
            "h3Id": CELL,
            "h3Res": "9",
            "start_year": 2018,
            "end_year": "2020"
        })))
        .unwrap();
        assert_eq!(params.res, 9);
        assert_eq!(params.years, Some((2018, 2020)));
    }

    #[test]
    fn test_parse_rejects_bad_resolution() {
        let err = HexMetricsTool::parse(&args(json!({"h3_id": CELL, "h3_res": 12}))).unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[test]
    fn test_query_binds_window() {
        let params = HexMetricsParams {
            cell: CELL.parse().unwrap(),
            res: 7,
            years: Some((2019, 2021)),
        };
        let query = metrics_query(&SchemaName::default(), &params);
        assert!(query.sql.contains("serving.gbif_cell_metrics"));
        assert!(query.sql.contains("BETWEEN $3 AND $4"));
        assert!(query.sql.ends_with("ORDER BY year"));
        assert_eq!(
            query.binds,
            vec![
                BindValue::Text(CELL.into()),
                BindValue::Integer(7),
                BindValue::Integer(2019),
                BindValue::Integer(2021),
            ]
        );
    }

    #[test]
    fn test_query_without_window() {
        let params = HexMetricsParams {
            cell: CELL.parse().unwrap(),
            res: 9,
            years: None,
        };
        let query = metrics_query(&SchemaName::default(), &params);
        assert!(!query.sql.contains("BETWEEN"));
        assert!(query.sql.ends_with("h3_resolution = $2 ORDER BY year"));
        assert_eq!(
            query.binds,
            vec![BindValue::Text(CELL.into()), BindValue::Integer(9)]
        );
    }

    #[tokio::test]
    async fn test_execute_echoes_resolution_and_builds_trend() {
        let fake = FakeCatalog::new().respond(
            "gbif_cell_metrics",
            vec![
                record(json!({"year": 2022, "species_richness_cell": 10, "n_threatened_species": 2, "dqi": 0.4})),
                record(json!({"year": 2023, "species_richness_cell": 15, "n_threatened_species": 1, "dqi": 0.5})),
            ],
        );
        let ctx = ToolContext::new(Arc::new(fake.clone()));

        for res in 6..=9 {
            let params = HexMetricsTool::parse(&args(json!({"h3_id": CELL, "h3_res": res}))).unwrap();
            let out = HexMetricsTool::execute(&params, &ctx).await.unwrap();
            assert_eq!(out["h3_resolution"], json!(res));
            assert_eq!(out["trend"]["species_richness_change"], json!(5));
            assert_eq!(out["trend"]["threatened_change"], json!(-1));
        }

        let (opened, closed) = fake.sessions();
        assert_eq!(opened, 4);
        assert_eq!(closed, 4);
    }

    #[tokio::test]
    async fn test_execute_empty_result() {
        let ctx = ToolContext::new(Arc::new(FakeCatalog::new()));
        let params = HexMetricsTool::parse(&args(json!({"h3_id": CELL, "h3_res": "7"}))).unwrap();
        let out = HexMetricsTool::execute(&params, &ctx).await.unwrap();
        assert_eq!(
            out,
            json!({"h3_id": CELL, "h3_resolution": 7, "metrics": [], "trend": null})
        );
    }
}
