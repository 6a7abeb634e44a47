//! Species context of one cell: every observed species ranked by
//! occurrences, with the threatened and invasive subsets split out.

use std::collections::HashSet;

use async_trait::async_trait;
use h3o::CellIndex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::common::{cell_id, coerce_flags, max_year};
use crate::core::database::{CatalogSession, SchemaName, SqlQuery, Table};
use crate::core::json::Record;
use crate::domains::tools::arguments::Arguments;
use crate::domains::tools::error::ToolError;
use crate::domains::tools::handlers::{BioTool, ToolContext};
use crate::domains::tools::registry::ToolKind;
use crate::domains::tools::validation::{validate_h3_id, validate_resolution, validate_year};

/// Parameters for the hex species context tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct HexSpeciesContextArgs {
    /// H3 cell id (8-15 hex characters).
    pub h3_id: String,

    /// H3 resolution, 6 to 9. Defaults to 7.
    pub h3_res: Option<u8>,

    /// Year to report. Defaults to the latest year with data for the cell.
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HexSpeciesContextParams {
    pub cell: CellIndex,
    pub res: u8,
    pub year: Option<i32>,
}

/// Species split into all / threatened / invasive lists.
#[derive(Debug, Default, PartialEq)]
pub struct SpeciesBreakdown {
    pub top_species: Vec<Record>,
    pub threatened: Vec<Record>,
    pub invasive: Vec<Record>,
}

/// De-duplicate by taxon key (first row wins) and partition by flag.
///
/// Rows are expected in descending occurrence order. The partitions are
/// not exclusive: a species can be both threatened and invasive.
pub fn split_species(rows: Vec<Record>) -> SpeciesBreakdown {
    let mut seen = HashSet::new();
    let mut out = SpeciesBreakdown::default();

    for mut row in rows {
        let key = row.get("taxon_key").cloned().unwrap_or(Value::Null).to_string();
        if !seen.insert(key) {
            continue;
        }
        coerce_flags(&mut row);
        if row.get("is_threatened") == Some(&Value::Bool(true)) {
            out.threatened.push(row.clone());
        }
        if row.get("is_invasive") == Some(&Value::Bool(true)) {
            out.invasive.push(row.clone());
        }
        out.top_species.push(row);
    }
    out
}

/// Hex species context tool.
pub struct HexSpeciesContextTool;

impl HexSpeciesContextTool {
    async fn resolve_year(
        session: &mut dyn CatalogSession,
        schema: &SchemaName,
        params: &HexSpeciesContextParams,
    ) -> Result<Option<i64>, ToolError> {
        if let Some(year) = params.year {
            return Ok(Some(year.into()));
        }
        let mapping = Table::SpeciesMapping.qualified(schema);

        let for_cell = SqlQuery::new(format!(
            "SELECT MAX(year) AS max_year FROM {} WHERE h3_index = $1 AND h3_resolution = $2",
            mapping
        ))
        .bind_text(cell_id(params.cell))
        .bind_int(params.res);
        if let Some(year) = max_year(session, &for_cell).await? {
            return Ok(Some(year));
        }

        let global = SqlQuery::new(format!("SELECT MAX(year) AS max_year FROM {}", mapping));
        max_year(session, &global).await
    }

    async fn fetch(
        session: &mut dyn CatalogSession,
        schema: &SchemaName,
        params: &HexSpeciesContextParams,
    ) -> Result<(Option<i64>, Vec<Record>), ToolError> {
        let year = Self::resolve_year(session, schema, params).await?;

        let mut sql = format!(
            "SELECT m.*, COALESCE(d.species_name, 'Unknown') AS species_name \
             FROM {} m \
             LEFT JOIN {} d ON d.taxon_key = m.taxon_key AND d.country = m.country AND d.year = m.year \
             WHERE m.h3_index = $1 AND m.h3_resolution = $2",
            Table::SpeciesMapping.qualified(schema),
            Table::SpeciesDim.qualified(schema),
        );
        if year.is_some() {
            sql.push_str(" AND m.year = $3");
        }
        sql.push_str(" ORDER BY m.occurrence_count DESC");

        let mut query = SqlQuery::new(sql)
            .bind_text(cell_id(params.cell))
            .bind_int(params.res);
        if let Some(year) = year {
            query = query.bind_int(year);
        }

        Ok((year, session.fetch_all(&query).await?))
    }
}

#[async_trait]
impl BioTool for HexSpeciesContextTool {
    const KIND: ToolKind = ToolKind::HexSpeciesContext;

    const DESCRIPTION: &'static str = "List the species observed in one H3 cell ranked by occurrence count, with the threatened and invasive species split out. Defaults to the latest year with data.";

    type Schema = HexSpeciesContextArgs;
    type Params = HexSpeciesContextParams;

    fn parse(args: &Arguments) -> Result<HexSpeciesContextParams, ToolError> {
        Ok(HexSpeciesContextParams {
            cell: validate_h3_id(args.get("h3_id"))?,
            res: validate_resolution(args.get("h3_res"))?,
            year: validate_year(args.get("year"), "year")?,
        })
    }

    #[instrument(skip_all, fields(h3_id = %params.cell, res = params.res))]
    async fn execute(params: &HexSpeciesContextParams, ctx: &ToolContext) -> Result<Value, ToolError> {
        let mut session = ctx.catalog().session().await?;
        let result = Self::fetch(session.as_mut(), ctx.schema(), params).await;
        session.close().await;
        let (year, rows) = result?;

        let breakdown = split_species(rows);
        debug!(
            "{} species, {} threatened, {} invasive",
            breakdown.top_species.len(),
            breakdown.threatened.len(),
            breakdown.invasive.len()
        );

        Ok(json!({
            "h3_id": cell_id(params.cell),
            "h3_resolution": params.res,
            "year": year,
            "top_species": breakdown.top_species,
            "threatened_species": breakdown.threatened,
            "invasive_species": breakdown.invasive,
        }))
    }
}
