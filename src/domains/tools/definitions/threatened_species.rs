//! IUCN assessment details for threatened species, given either explicit
//! species names or a cell whose threatened species are looked up.

use async_trait::async_trait;
use h3o::CellIndex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::common::cell_id;
use crate::core::database::{CatalogSession, SchemaName, SqlQuery, Table};
use crate::core::json::Record;
use crate::domains::tools::arguments::Arguments;
use crate::domains::tools::error::ToolError;
use crate::domains::tools::handlers::{BioTool, ToolContext};
use crate::domains::tools::registry::ToolKind;
use crate::domains::tools::validation::{
    split_list_string, validate_h3_id, validate_resolution, validate_species_list,
};

/// Parameters for the threatened species tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ThreatenedSpeciesArgs {
    /// Scientific names (list, JSON array string or comma separated). Takes precedence over the cell.
    pub species_ids_or_names: Option<Vec<String>>,

    /// H3 cell whose threatened species should be described.
    pub h3_id: Option<String>,

    /// H3 resolution of the cell, 6 to 9.
    pub h3_res: Option<u8>,
}

/// Where the species names come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeciesSource {
    Names(Vec<String>),
    Cell { cell: CellIndex, res: u8 },
    Missing,
}

/// Threatened species tool.
pub struct ThreatenedSpeciesTool;

impl ThreatenedSpeciesTool {
    async fn names_in_cell(
        session: &mut dyn CatalogSession,
        schema: &SchemaName,
        cell: CellIndex,
        res: u8,
    ) -> Result<Vec<String>, ToolError> {
        let query = SqlQuery::new(format!(
            "SELECT DISTINCT d.species_name \
             FROM {} m \
             JOIN {} d ON d.taxon_key = m.taxon_key AND d.country = m.country AND d.year = m.year \
             WHERE m.h3_index = $1 AND m.h3_resolution = $2 AND m.is_threatened = true",
            Table::SpeciesMapping.qualified(schema),
            Table::SpeciesDim.qualified(schema),
        ))
        .bind_text(cell_id(cell))
        .bind_int(res);

        Ok(session
            .fetch_all(&query)
            .await?
            .iter()
            .filter_map(|r| r.get("species_name").and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn profiles(
        session: &mut dyn CatalogSession,
        schema: &SchemaName,
        names: &[String],
    ) -> Result<Vec<Record>, ToolError> {
        let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
        let query = SqlQuery::new(format!(
            "SELECT * FROM {} WHERE LOWER(scientific_name) = ANY($1)",
            Table::IucnProfiles.qualified(schema)
        ))
        .bind_text_array(lowered);
        Ok(session.fetch_all(&query).await?)
    }

    async fn fetch(
        session: &mut dyn CatalogSession,
        schema: &SchemaName,
        source: &SpeciesSource,
    ) -> Result<Option<Vec<Record>>, ToolError> {
        let names = match source {
            SpeciesSource::Names(names) => names.clone(),
            SpeciesSource::Cell { cell, res } => {
                Self::names_in_cell(session, schema, *cell, *res).await?
            }
            SpeciesSource::Missing => return Ok(None),
        };
        if names.is_empty() {
            return Ok(None);
        }
        debug!("Looking up {} IUCN profiles", names.len());
        Ok(Some(Self::profiles(session, schema, &names).await?))
    }
}

#[async_trait]
impl BioTool for ThreatenedSpeciesTool {
    const KIND: ToolKind = ToolKind::ThreatenedSpecies;

    const DESCRIPTION: &'static str = "Get IUCN assessment details (category, rationale, habitat, threats, conservation actions) for threatened species, given species names or an H3 cell whose threatened species should be described.";

    type Schema = ThreatenedSpeciesArgs;
    type Params = SpeciesSource;

    fn parse(args: &Arguments) -> Result<SpeciesSource, ToolError> {
        if let Some(list) = args.get("species_ids_or_names") {
            return Ok(SpeciesSource::Names(validate_species_list(
                Some(&split_list_string(list)),
                "species_ids_or_names",
            )?));
        }
        if args.contains("h3_id") && args.contains("h3_res") {
            return Ok(SpeciesSource::Cell {
                cell: validate_h3_id(args.get("h3_id"))?,
                res: validate_resolution(args.get("h3_res"))?,
            });
        }
        Ok(SpeciesSource::Missing)
    }

    #[instrument(skip_all)]
    async fn execute(source: &SpeciesSource, ctx: &ToolContext) -> Result<Value, ToolError> {
        if *source == SpeciesSource::Missing {
            return Ok(json!({
                "threatened_species_info": [],
                "message": "Provide either h3_id+h3_res or species_ids_or_names",
            }));
        }

        let mut session = ctx.catalog().session().await?;
        let result = Self::fetch(session.as_mut(), ctx.schema(), source).await;
        session.close().await;

        Ok(match result? {
            Some(info) => {
                let count = info.len();
                json!({
                    "threatened_species_info": info,
                    "count": count,
                })
            }
            None => json!({
                "threatened_species_info": [],
                "message": "No threatened species found",
            }),
        })
    }
}
