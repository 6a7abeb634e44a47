//! OpenStreetMap land-cover and infrastructure context of one cell.

use async_trait::async_trait;
use h3o::CellIndex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use super::common::cell_id;
use crate::core::database::{SchemaName, SqlQuery, Table};
use crate::domains::tools::arguments::Arguments;
use crate::domains::tools::error::ToolError;
use crate::domains::tools::handlers::{BioTool, ToolContext};
use crate::domains::tools::registry::ToolKind;
use crate::domains::tools::validation::{validate_h3_id, validate_resolution};

/// Parameters for the OSM context tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct OsmContextArgs {
    /// H3 cell id (8-15 hex characters).
    pub h3_id: String,

    /// H3 resolution, 6 to 9. Defaults to 7.
    pub h3_res: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OsmContextParams {
    pub cell: CellIndex,
    pub res: u8,
}

fn osm_query(schema: &SchemaName, params: &OsmContextParams) -> SqlQuery {
    SqlQuery::new(format!(
        "SELECT * FROM {} WHERE h3_index = $1 AND h3_resolution = $2",
        Table::OsmFeatures.qualified(schema)
    ))
    .bind_text(cell_id(params.cell))
    .bind_int(params.res)
}

/// OSM context tool.
pub struct OsmContextTool;

#[async_trait]
impl BioTool for OsmContextTool {
    const KIND: ToolKind = ToolKind::OsmContext;

    const DESCRIPTION: &'static str = "Get OpenStreetMap-derived context for one H3 cell: land-cover percentages, road, port and airport densities, urban share and protected area coverage.";

    type Schema = OsmContextArgs;
    type Params = OsmContextParams;

    fn parse(args: &Arguments) -> Result<OsmContextParams, ToolError> {
        Ok(OsmContextParams {
            cell: validate_h3_id(args.get("h3_id"))?,
            res: validate_resolution(args.get("h3_res"))?,
        })
    }

    #[instrument(skip_all, fields(h3_id = %params.cell, res = params.res))]
    async fn execute(params: &OsmContextParams, ctx: &ToolContext) -> Result<Value, ToolError> {
        let query = osm_query(ctx.schema(), params);

        let mut session = ctx.catalog().session().await?;
        let result = session.fetch_optional(&query).await;
        session.close().await;

        Ok(match result? {
            Some(row) => json!({
                "h3_id": cell_id(params.cell),
                "h3_resolution": params.res,
                "osm_context": row,
            }),
            None => json!({
                "h3_id": cell_id(params.cell),
                "h3_resolution": params.res,
                "osm_context": null,
                "message": "No OSM data found for this cell",
            }),
        })
    }
}
