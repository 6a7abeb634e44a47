//! The server handler shared by every transport.
//!
//! [`McpServer`] owns the tool registry, the agent invocation router, the
//! explorer and the resource service. Over stdio and TCP it is driven by
//! rmcp through [`ServerHandler`]; the HTTP transport calls the plain
//! async methods below, which return JSON values.
//!
//! Tools live in `domains/tools/definitions/`, one file per tool, and are
//! registered in `domains/tools/router.rs`.

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, handler::server::tool::ToolRouter, model::*,
    service::RequestContext, tool_handler,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use super::config::Config;
use super::database::Catalog;
use crate::domains::{
    explorer::ExplorerService,
    resources::{ResourceError, ResourceService},
    tools::{
        ActionGroupRouter, Arguments, ToolContext, ToolError, ToolRegistry, build_tool_router,
        registry::resolve_tool, structured_result,
    },
};

const INSTRUCTIONS: &str = "Biodiversity data server. Tools query H3-gridded species metrics, \
    neighborhoods, threatened species and OpenStreetMap context; resources expose the tool \
    catalog, explorer metrics and rendered explorer layers.";

/// Server handler. Cheap to clone; every service sits behind an `Arc`.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Dispatches tools by kind.
    registry: ToolRegistry,

    /// Agent invocation envelopes.
    invocations: Arc<ActionGroupRouter>,

    /// Map explorer.
    explorer: Arc<ExplorerService>,

    /// Static resources and explorer layers.
    resource_service: Arc<ResourceService>,

    /// rmcp routes, read by `#[tool_handler]`.
    tool_router: ToolRouter<Self>,
}

impl McpServer {
    /// Create a new MCP server over the given catalog.
    pub fn new(config: Config, catalog: Arc<dyn Catalog>) -> Self {
        let explorer = Arc::new(ExplorerService::new(config.explorer.clone()));
        Self::with_explorer(config, catalog, explorer)
    }

    /// Create a server with an explicitly built explorer.
    pub fn with_explorer(
        config: Config,
        catalog: Arc<dyn Catalog>,
        explorer: Arc<ExplorerService>,
    ) -> Self {
        let config = Arc::new(config);
        let ctx = ToolContext::new(catalog);
        let registry = ToolRegistry::new(ctx.clone());
        let resource_service = Arc::new(ResourceService::new(
            config.resources.clone(),
            Arc::clone(&explorer),
        ));

        Self {
            tool_router: build_tool_router::<Self>(ctx),
            invocations: Arc::new(ActionGroupRouter::new(registry.clone())),
            registry,
            explorer,
            resource_service,
            config,
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn instructions(&self) -> &'static str {
        INSTRUCTIONS
    }

    /// Agent invocation router.
    pub fn invocations(&self) -> &ActionGroupRouter {
        &self.invocations
    }

    /// Map explorer.
    pub fn explorer(&self) -> &ExplorerService {
        &self.explorer
    }

    // ------------------------------------------------------------------------
    // JSON views for the HTTP transport
    // ------------------------------------------------------------------------

    /// Tool descriptors as serialized by rmcp.
    pub fn list_tools(&self) -> Vec<Value> {
        as_json_list(self.tool_router.list_all())
    }

    /// Call a tool by any of its accepted names.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let args = match arguments {
            Value::Object(map) => Arguments::from_object(&map),
            Value::Null => Arguments::new(),
            _ => return Err(ToolError::validation("Tool arguments must be an object")),
        };
        let kind = resolve_tool(name, &args)?;
        let value = self.registry.dispatch(kind, &args).await?;
        serde_json::to_value(structured_result(value)).map_err(|e| ToolError::internal(e.to_string()))
    }

    pub async fn list_resources(&self) -> Vec<Value> {
        as_json_list(self.resource_service.list_resources().await)
    }

    /// `{contents: [...]}` for one resource URI.
    pub async fn read_resource(&self, uri: &str) -> Result<Value, ResourceError> {
        let result = self.resource_service.read_resource(uri).await?;
        Ok(serde_json::json!({ "contents": result.contents }))
    }

    pub async fn list_resource_templates(&self) -> Vec<Value> {
        as_json_list(self.resource_service.list_resource_templates().await)
    }
}

fn as_json_list<T: serde::Serialize>(items: Vec<T>) -> Vec<Value> {
    items
        .into_iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect()
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    #[instrument(skip(self, _context))]
    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        info!("Listing resources");
        let resources = self.resource_service.list_resources().await;
        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, _context))]
    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        info!("Listing resource templates");
        let templates = self.resource_service.list_resource_templates().await;
        Ok(ListResourceTemplatesResult {
            resource_templates: templates,
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, _context))]
    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        info!("Reading resource: {}", request.uri);
        self.resource_service
            .read_resource(&request.uri)
            .await
            .map_err(|e| match e {
                ResourceError::InvalidUri(_) => McpError::invalid_params(e.to_string(), None),
                ResourceError::NotFound(_) => McpError::resource_not_found(e.to_string(), None),
                other => McpError::internal_error(other.to_string(), None),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::catalog::testing::FakeCatalog;
    use serde_json::json;

    fn server() -> McpServer {
        McpServer::new(Config::default(), Arc::new(FakeCatalog::new()))
    }

    #[test]
    fn test_lists_seven_tools() {
        let tools = server().list_tools();
        assert_eq!(tools.len(), 7);
        assert!(tools.iter().any(|t| t["name"] == "getOSMContext"));
    }

    #[tokio::test]
    async fn test_call_tool_by_path_and_quick_action() {
        let server = server();

        let result = server
            .call_tool("/getNeighborHexes", json!({"h3Id": "8928308280fffff", "h3_res": 9}))
            .await
            .unwrap();
        assert_eq!(result["structuredContent"]["neighbor_count"], 6);

        let result = server
            .call_tool("quick_action", json!({"h3_id": "8928308280fffff", "h3_res": 9, "k_ring": 2}))
            .await
            .unwrap();
        assert_eq!(result["structuredContent"]["neighbor_count"], 18);
    }

    #[tokio::test]
    async fn test_call_tool_errors() {
        let server = server();
        assert!(matches!(
            server.call_tool("nope", json!({})).await,
            Err(ToolError::UnknownTool(_))
        ));
        assert!(matches!(
            server.call_tool("getNeighborHexes", json!([1])).await,
            Err(ToolError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_resources_listed() {
        let server = server();
        assert_eq!(server.list_resources().await.len(), 2);
        assert_eq!(server.list_resource_templates().await.len(), 1);
        let read = server.read_resource("bio://explorer/metrics").await.unwrap();
        assert_eq!(read["contents"][0]["uri"], "bio://explorer/metrics");
    }
}
