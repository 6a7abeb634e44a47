//! Tool Router - builds the rmcp ToolRouter from the tool definitions.
//!
//! Each tool creates its own route through the generic [`create_route`].

use rmcp::handler::server::tool::ToolRouter;

use super::definitions::{
    HexMetricsTool, HexSpeciesContextTool, NeighborHexesTool, NeighborSummaryTool, OsmContextTool,
    SpeciesProfilesTool, ThreatenedSpeciesTool,
};
use super::handlers::{ToolContext, create_route};

/// Build the tool router with all registered tools.
pub fn build_tool_router<S>(ctx: ToolContext) -> ToolRouter<S>
where
    S: Send + Sync + 'static,
{
    ToolRouter::new()
        .with_route(create_route::<HexMetricsTool, S>(ctx.clone()))
        .with_route(create_route::<NeighborHexesTool, S>(ctx.clone()))
        .with_route(create_route::<NeighborSummaryTool, S>(ctx.clone()))
        .with_route(create_route::<HexSpeciesContextTool, S>(ctx.clone()))
        .with_route(create_route::<OsmContextTool, S>(ctx.clone()))
        .with_route(create_route::<ThreatenedSpeciesTool, S>(ctx.clone()))
        .with_route(create_route::<SpeciesProfilesTool, S>(ctx))
}

#[cfg(test)]
mod tests {
    use super::super::registry::ToolRegistry;
    use super::*;
    use crate::core::database::catalog::testing::FakeCatalog;
    use std::sync::Arc;

    struct TestServer {}

    fn test_context() -> ToolContext {
        ToolContext::new(Arc::new(FakeCatalog::new()))
    }

    #[test]
    fn test_build_router() {
        let router: ToolRouter<TestServer> = build_tool_router(test_context());
        let tools = router.list_all();
        assert_eq!(tools.len(), 7);

        let names: Vec<_> = tools.iter().map(|t| t.name.as_ref()).collect();
        assert!(names.contains(&"getHexMetrics"));
        assert!(names.contains(&"getNeighborHexes"));
        assert!(names.contains(&"getNeighborSummary"));
        assert!(names.contains(&"getHexSpeciesContext"));
        assert!(names.contains(&"getSpeciesProfiles"));
    }

    #[test]
    fn test_registry_matches_router() {
        let registry = ToolRegistry::new(test_context());
        let registry_names = registry.tool_names();

        let router: ToolRouter<TestServer> = build_tool_router(test_context());
        let router_tools = router.list_all();
        let router_names: Vec<_> = router_tools.iter().map(|t| t.name.as_ref()).collect();

        assert_eq!(registry_names.len(), router_names.len());
        for name in registry_names {
            assert!(router_names.contains(&name));
        }
    }
}
