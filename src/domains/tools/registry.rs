//! Tool Registry - naming, resolution and dispatch for all tools.
//!
//! This module provides:
//! - [`ToolKind`], the closed set of tools and their three accepted names
//! - Quick-action inference from the keys of a parameter set
//! - [`ToolRegistry`], which dispatches a resolved tool against the catalog

use rmcp::model::Tool;
use tracing::{debug, warn};

use serde_json::Value;

use super::arguments::Arguments;
use super::definitions::{
    HexMetricsTool, HexSpeciesContextTool, NeighborHexesTool, NeighborSummaryTool, OsmContextTool,
    SpeciesProfilesTool, ThreatenedSpeciesTool,
};
use super::error::ToolError;
use super::handlers::{ToolContext, run, to_tool};

/// The seven biodiversity tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    HexMetrics,
    NeighborHexes,
    NeighborSummary,
    HexSpeciesContext,
    OsmContext,
    ThreatenedSpecies,
    SpeciesProfiles,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::HexMetrics,
        ToolKind::NeighborHexes,
        ToolKind::NeighborSummary,
        ToolKind::HexSpeciesContext,
        ToolKind::OsmContext,
        ToolKind::ThreatenedSpecies,
        ToolKind::SpeciesProfiles,
    ];

    /// Upper-camel name, e.g. `GetHexMetrics`.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Self::HexMetrics => "GetHexMetrics",
            Self::NeighborHexes => "GetNeighborHexes",
            Self::NeighborSummary => "GetNeighborSummary",
            Self::HexSpeciesContext => "GetHexSpeciesContext",
            Self::OsmContext => "GetOSMContext",
            Self::ThreatenedSpecies => "GetInfoAboutThreatenedSpecies",
            Self::SpeciesProfiles => "GetSpeciesProfiles",
        }
    }

    /// Lower-camel name used for MCP tools and function invocations.
    pub fn mcp_name(self) -> &'static str {
        match self {
            Self::HexMetrics => "getHexMetrics",
            Self::NeighborHexes => "getNeighborHexes",
            Self::NeighborSummary => "getNeighborSummary",
            Self::HexSpeciesContext => "getHexSpeciesContext",
            Self::OsmContext => "getOSMContext",
            Self::ThreatenedSpecies => "getInfoAboutThreatenedSpecies",
            Self::SpeciesProfiles => "getSpeciesProfiles",
        }
    }

    /// Slash-prefixed API path, e.g. `/getHexMetrics`.
    pub fn api_path(self) -> String {
        format!("/{}", self.mcp_name())
    }

    /// Look a tool up by any of its names. A leading `/` is ignored.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().trim_start_matches('/');
        Self::ALL
            .into_iter()
            .find(|kind| kind.canonical_name() == key || kind.mcp_name() == key)
    }
}

/// Placeholder names an agent sends when it did not pick a tool.
pub const QUICK_ACTION_NAMES: [&str; 3] = [
    "action_group_quick_action1",
    "action_group_quick_action",
    "quick_action",
];

pub fn is_quick_action(name: &str) -> bool {
    let name = name.trim().trim_start_matches('/');
    QUICK_ACTION_NAMES.contains(&name)
}

fn has_h3_ids(args: &Arguments) -> bool {
    args.contains("h3_ids")
}

fn has_k_ring(args: &Arguments) -> bool {
    args.contains("k_ring")
}

fn has_species_ids_or_names(args: &Arguments) -> bool {
    args.contains("species_ids") || args.contains("species_names")
}

fn has_threatened_list(args: &Arguments) -> bool {
    args.contains("species_ids_or_names")
}

fn has_single_cell(args: &Arguments) -> bool {
    args.contains("h3_id") && args.contains("h3_res")
}

/// Ordered inference table; the first matching predicate wins.
const INFERENCE_RULES: [(fn(&Arguments) -> bool, ToolKind); 5] = [
    (has_h3_ids, ToolKind::NeighborSummary),
    (has_k_ring, ToolKind::NeighborHexes),
    (has_species_ids_or_names, ToolKind::SpeciesProfiles),
    (has_threatened_list, ToolKind::ThreatenedSpecies),
    (has_single_cell, ToolKind::HexMetrics),
];

/// Infer the intended tool of a quick action from the present keys.
pub fn infer_tool(args: &Arguments) -> Option<ToolKind> {
    INFERENCE_RULES
        .iter()
        .find(|(matches, _)| matches(args))
        .map(|(_, kind)| *kind)
}

/// Resolve an invocation name (canonical, lower-camel, path or quick action).
pub fn resolve_tool(name: &str, args: &Arguments) -> Result<ToolKind, ToolError> {
    if let Some(kind) = ToolKind::from_key(name) {
        return Ok(kind);
    }
    if is_quick_action(name) {
        if let Some(kind) = infer_tool(args) {
            debug!("Quick action '{}' inferred as {}", name, kind.canonical_name());
            return Ok(kind);
        }
        warn!("Could not infer tool for '{}' from keys {:?}", name, args.keys());
    } else {
        warn!("Unknown tool requested: {}", name);
    }
    Err(ToolError::unknown_tool(name))
}

// ============================================================================
// Tool Registry
// ============================================================================

/// Tool registry - dispatches resolved tools against the catalog.
///
/// Both the MCP router and the invocation router go through the same
/// [`run`] entry point, so validation and response shapes never diverge.
#[derive(Clone)]
pub struct ToolRegistry {
    ctx: ToolContext,
}

impl ToolRegistry {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Get all tool names.
    pub fn tool_names(&self) -> Vec<&'static str> {
        ToolKind::ALL.iter().map(|kind| kind.mcp_name()).collect()
    }

    /// Get all tools as Tool models (metadata).
    pub fn get_all_tools() -> Vec<Tool> {
        vec![
            to_tool::<HexMetricsTool>(),
            to_tool::<NeighborHexesTool>(),
            to_tool::<NeighborSummaryTool>(),
            to_tool::<HexSpeciesContextTool>(),
            to_tool::<OsmContextTool>(),
            to_tool::<ThreatenedSpeciesTool>(),
            to_tool::<SpeciesProfilesTool>(),
        ]
    }

    /// Run one tool with a normalized parameter set.
    pub async fn dispatch(&self, kind: ToolKind, args: &Arguments) -> Result<Value, ToolError> {
        let ctx = &self.ctx;
        match kind {
            ToolKind::HexMetrics => run::<HexMetricsTool>(args, ctx).await,
            ToolKind::NeighborHexes => run::<NeighborHexesTool>(args, ctx).await,
            ToolKind::NeighborSummary => run::<NeighborSummaryTool>(args, ctx).await,
            ToolKind::HexSpeciesContext => run::<HexSpeciesContextTool>(args, ctx).await,
            ToolKind::OsmContext => run::<OsmContextTool>(args, ctx).await,
            ToolKind::ThreatenedSpecies => run::<ThreatenedSpeciesTool>(args, ctx).await,
            ToolKind::SpeciesProfiles => run::<SpeciesProfilesTool>(args, ctx).await,
        }
    }
}
