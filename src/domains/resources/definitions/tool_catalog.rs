//! Tool catalog resource: every tool under each of its accepted names.

use serde_json::json;

use super::ResourceDefinition;
use crate::domains::resources::service::ResourceContent;
use crate::domains::tools::registry::{QUICK_ACTION_NAMES, ToolKind};

pub struct ToolCatalogResource;

impl ResourceDefinition for ToolCatalogResource {
    const URI: &'static str = "bio://tools/catalog";
    const NAME: &'static str = "Tool Catalog";
    const DESCRIPTION: &'static str =
        "Canonical names, MCP names and API paths of the biodiversity tools";
    const MIME_TYPE: &'static str = "application/json";

    fn content() -> ResourceContent {
        let tools: Vec<_> = ToolKind::ALL
            .iter()
            .map(|kind| {
                json!({
                    "canonical": kind.canonical_name(),
                    "name": kind.mcp_name(),
                    "api_path": kind.api_path(),
                })
            })
            .collect();

        ResourceContent::Text(
            json!({
                "tools": tools,
                "quick_actions": QUICK_ACTION_NAMES,
            })
            .to_string(),
        )
    }
}
