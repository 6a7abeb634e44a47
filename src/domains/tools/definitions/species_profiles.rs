//! Species profiles for narrative answers.
//!
//! Numeric entries are GBIF taxon keys; anything else is a name, matched
//! exactly against IUCN profiles first and then as a substring of GBIF
//! species names. Every found profile carries a `profile_text` summary.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::common::coerce_flags;
use crate::core::database::{CatalogSession, SchemaName, SqlQuery, Table, escape_like};
use crate::core::json::{Record, display_value, is_truthy};
use crate::domains::tools::arguments::Arguments;
use crate::domains::tools::error::ToolError;
use crate::domains::tools::handlers::{BioTool, ToolContext};
use crate::domains::tools::registry::ToolKind;
use crate::domains::tools::validation::{split_list_string, validate_species_list};

/// Parameters for the species profiles tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SpeciesProfilesArgs {
    /// GBIF taxon keys (list, JSON array string or comma separated).
    pub species_ids: Option<Vec<String>>,

    /// Scientific names, used when species_ids is absent.
    pub species_names: Option<Vec<String>>,
}

/// Requested species, split by kind. Empty when nothing was requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileRequest {
    pub taxon_keys: Vec<String>,
    pub names: Vec<String>,
}

impl ProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.taxon_keys.is_empty() && self.names.is_empty()
    }
}

const GBIF_SOURCE: &str = "gbif_species_dim";
const IUCN_SOURCE: &str = "iucn_species_profiles";

/// Narrative fields, in output order.
const PROFILE_LINES: [(&str, &str); 6] = [
    ("species_name", "Species"),
    ("iucn_category", "IUCN"),
    ("rationale", "Rationale"),
    ("habitat_ecology", "Habitat"),
    ("threats_text", "Threats"),
    ("conservation_text", "Conservation"),
];

/// Build the newline-joined profile summary of a found record.
pub fn profile_text(profile: &Record) -> String {
    let mut lines: Vec<String> = PROFILE_LINES
        .iter()
        .filter(|(field, _)| is_truthy(profile.get(*field)))
        .filter_map(|(field, label)| {
            profile
                .get(*field)
                .map(|v| format!("{}: {}", label, display_value(v)))
        })
        .collect();

    if let Some(count) = profile.get("occurrence_count").filter(|v| !v.is_null()) {
        lines.push(format!("Occurrences: {}", display_value(count)));
    }

    if lines.is_empty() {
        "No profile available".to_string()
    } else {
        lines.join("\n")
    }
}

fn tag(mut record: Record, source: &str) -> Record {
    record.insert("source".to_string(), Value::String(source.to_string()));
    if source == GBIF_SOURCE {
        coerce_flags(&mut record);
    }
    record
}

fn not_found(name: &str) -> Record {
    let mut record = Record::new();
    record.insert("requested".to_string(), Value::String(name.to_string()));
    record.insert("found".to_string(), Value::Bool(false));
    record.insert(
        "message".to_string(),
        Value::String("Species not found in database".to_string()),
    );
    record
}

/// Species profiles tool.
pub struct SpeciesProfilesTool;

impl SpeciesProfilesTool {
    async fn by_taxon_keys(
        session: &mut dyn CatalogSession,
        schema: &SchemaName,
        keys: &[String],
    ) -> Result<Vec<Record>, ToolError> {
        let query = SqlQuery::new(format!(
            "SELECT DISTINCT ON (d.taxon_key) d.* FROM {} d \
             WHERE d.taxon_key::text = ANY($1) \
             ORDER BY d.taxon_key, d.occurrence_count DESC NULLS LAST",
            Table::SpeciesDim.qualified(schema)
        ))
        .bind_text_array(keys.to_vec());

        Ok(session
            .fetch_all(&query)
            .await?
            .into_iter()
            .map(|r| tag(r, GBIF_SOURCE))
            .collect())
    }

    async fn by_name(
        session: &mut dyn CatalogSession,
        schema: &SchemaName,
        name: &str,
    ) -> Result<Vec<Record>, ToolError> {
        let exact = SqlQuery::new(format!(
            "SELECT * FROM {} WHERE LOWER(scientific_name) = LOWER($1)",
            Table::IucnProfiles.qualified(schema)
        ))
        .bind_text(name);
        if let Some(row) = session.fetch_optional(&exact).await? {
            return Ok(vec![tag(row, IUCN_SOURCE)]);
        }

        let fuzzy = SqlQuery::new(format!(
            "SELECT * FROM {} WHERE LOWER(species_name) LIKE LOWER($1) ESCAPE '\\' \
             ORDER BY occurrence_count DESC NULLS LAST",
            Table::SpeciesDim.qualified(schema)
        ))
        .bind_text(format!("%{}%", escape_like(name)));
        let rows = session.fetch_all(&fuzzy).await?;
        if rows.is_empty() {
            debug!("No species matched '{}'", name);
            return Ok(vec![not_found(name)]);
        }
        Ok(rows.into_iter().map(|r| tag(r, GBIF_SOURCE)).collect())
    }

    async fn fetch(
        session: &mut dyn CatalogSession,
        schema: &SchemaName,
        request: &ProfileRequest,
    ) -> Result<Vec<Record>, ToolError> {
        let mut profiles = Vec::new();
        if !request.taxon_keys.is_empty() {
            profiles.extend(Self::by_taxon_keys(session, schema, &request.taxon_keys).await?);
        }
        for name in &request.names {
            profiles.extend(Self::by_name(session, schema, name).await?);
        }
        Ok(profiles)
    }
}

#[async_trait]
impl BioTool for SpeciesProfilesTool {
    const KIND: ToolKind = ToolKind::SpeciesProfiles;

    const DESCRIPTION: &'static str = "Get species profiles with a ready-to-quote profile_text, by GBIF taxon key or scientific name. Names match IUCN profiles exactly first, then GBIF species names by substring.";

    type Schema = SpeciesProfilesArgs;
    type Params = ProfileRequest;

    fn parse(args: &Arguments) -> Result<ProfileRequest, ToolError> {
        let (field, raw) = match (args.get("species_ids"), args.get("species_names")) {
            (Some(ids), _) => ("species_ids", Some(ids)),
            (None, Some(names)) => ("species_names", Some(names)),
            (None, None) => ("species_ids", None),
        };

        let raw = raw.map(split_list_string);
        let (taxon_keys, names) = validate_species_list(raw.as_ref(), field)?
            .into_iter()
            .partition(|entry| entry.parse::<i64>().is_ok());
        Ok(ProfileRequest { taxon_keys, names })
    }

    #[instrument(skip_all, fields(keys = request.taxon_keys.len(), names = request.names.len()))]
    async fn execute(request: &ProfileRequest, ctx: &ToolContext) -> Result<Value, ToolError> {
        if request.is_empty() {
            return Ok(json!({
                "profiles": [],
                "message": "At least one species ID or name required",
            }));
        }

        let mut session = ctx.catalog().session().await?;
        let result = Self::fetch(session.as_mut(), ctx.schema(), request).await;
        session.close().await;

        let mut profiles = result?;
        for profile in profiles.iter_mut() {
            if profile.get("found") == Some(&Value::Bool(false)) {
                continue;
            }
            let text = profile_text(profile);
            profile.insert("profile_text".to_string(), Value::String(text));
        }

        let count = profiles.len();
        Ok(json!({
            "profiles": profiles,
            "count": count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::BindValue;
    use crate::core::database::catalog::testing::FakeCatalog;
    use std::sync::Arc;

    fn args(value: Value) -> Arguments {
        Arguments::from_object(value.as_object().unwrap())
    }

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_splits_keys_and_names() {
        let request = SpeciesProfilesTool::parse(&args(json!({
            "speciesIds": "2435099, Lynx pardinus"
        })))
        .unwrap();
        assert_eq!(request.taxon_keys, vec!["2435099"]);
        assert_eq!(request.names, vec!["Lynx pardinus"]);
    }

    #[test]
    fn test_parse_absent_is_empty() {
        assert!(SpeciesProfilesTool::parse(&Arguments::new()).unwrap().is_empty());
    }

    #[test]
    fn test_profile_text_order_and_fallback() {
        let profile = record(json!({
            "occurrence_count": 0,
            "threats_text": "Habitat loss",
            "species_name": "Lynx pardinus",
            "iucn_category": "EN",
            "rationale": ""
        }));
        assert_eq!(
            profile_text(&profile),
            "Species: Lynx pardinus\nIUCN: EN\nThreats: Habitat loss\nOccurrences: 0"
        );
        assert_eq!(profile_text(&Record::new()), "No profile available");
    }

    #[tokio::test]
    async fn test_empty_request_message() {
        let ctx = ToolContext::new(Arc::new(FakeCatalog::new()));
        let out = SpeciesProfilesTool::execute(&ProfileRequest::default(), &ctx)
            .await
            .unwrap();
        assert_eq!(out["profiles"], json!([]));
        assert!(out["message"].is_string());
    }

    #[tokio::test]
    async fn test_name_falls_back_to_escaped_substring_then_not_found() {
        let fake = FakeCatalog::new();
        let ctx = ToolContext::new(Arc::new(fake.clone()));
        let request = ProfileRequest {
            taxon_keys: vec![],
            names: vec!["100%_lynx".into()],
        };

        let out = SpeciesProfilesTool::execute(&request, &ctx).await.unwrap();
        assert_eq!(out["count"], json!(1));
        assert_eq!(out["profiles"][0]["found"], json!(false));
        assert_eq!(out["profiles"][0]["requested"], "100%_lynx");
        assert!(out["profiles"][0].get("profile_text").is_none());

        let executed = fake.executed();
        assert_eq!(executed.len(), 2);
        assert_eq!(
            executed[1].binds[0],
            BindValue::Text("%100\\%\\_lynx%".into())
        );
    }

    #[tokio::test]
    async fn test_iucn_match_and_taxon_keys() {
        let fake = FakeCatalog::new()
            .respond(
                "DISTINCT ON",
                vec![record(json!({"taxon_key": 2435099, "species_name": "Lynx pardinus", "occurrence_count": 12, "is_threatened": true}))],
            )
            .respond(
                "iucn_species_profiles",
                vec![record(json!({"scientific_name": "Aquila adalberti", "iucn_category": "VU"}))],
            );
        let ctx = ToolContext::new(Arc::new(fake));
        let request = ProfileRequest {
            taxon_keys: vec!["2435099".into()],
            names: vec!["aquila adalberti".into()],
        };

        let out = SpeciesProfilesTool::execute(&request, &ctx).await.unwrap();
        assert_eq!(out["count"], json!(2));
        assert_eq!(out["profiles"][0]["source"], GBIF_SOURCE);
        assert_eq!(out["profiles"][0]["is_invasive"], json!(false));
        assert_eq!(
            out["profiles"][0]["profile_text"],
            "Species: Lynx pardinus\nOccurrences: 12"
        );
        assert_eq!(out["profiles"][1]["source"], IUCN_SOURCE);
        assert_eq!(out["profiles"][1]["profile_text"], "IUCN: VU");
    }
}
