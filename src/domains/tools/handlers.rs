//! Tool handler seam.
//!
//! Every biodiversity tool implements [`BioTool`]: it parses a normalized
//! [`Arguments`] set into typed parameters, then executes against the
//! catalog. The MCP route, the tool metadata and the invocation dispatch
//! are all derived generically from that one implementation.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Content, Tool},
};
use schemars::JsonSchema;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::arguments::Arguments;
use super::error::ToolError;
use super::registry::ToolKind;
use crate::core::database::{Catalog, SchemaName};

/// Shared state handed to every tool execution.
#[derive(Clone)]
pub struct ToolContext {
    catalog: Arc<dyn Catalog>,
}

impl ToolContext {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    pub fn schema(&self) -> &SchemaName {
        self.catalog.schema()
    }
}

/// A tool that can be listed over MCP and dispatched from an invocation.
#[async_trait]
pub trait BioTool: Send + Sync + 'static {
    /// Which tool this is.
    const KIND: ToolKind;

    /// Description shown to clients.
    const DESCRIPTION: &'static str;

    /// Input shape advertised to clients.
    type Schema: JsonSchema + 'static;

    /// Validated parameters.
    type Params: Send + Sync;

    /// Validate arguments. Any violation fails the whole call.
    fn parse(args: &Arguments) -> Result<Self::Params, ToolError>;

    /// Run the tool and build its JSON response object.
    async fn execute(params: &Self::Params, ctx: &ToolContext) -> Result<Value, ToolError>;
}

/// Parse then execute a tool.
#[instrument(skip_all, fields(tool = T::KIND.mcp_name()))]
pub async fn run<T: BioTool>(args: &Arguments, ctx: &ToolContext) -> Result<Value, ToolError> {
    debug!("Tool called with keys {:?}", args.keys());
    let params = T::parse(args)?;
    T::execute(&params, ctx).await
}

/// Create a Tool model for a tool (metadata).
pub fn to_tool<T: BioTool>() -> Tool {
    Tool {
        name: T::KIND.mcp_name().into(),
        description: Some(T::DESCRIPTION.into()),
        input_schema: cached_schema_for_type::<T::Schema>(),
        annotations: None,
        output_schema: None,
        icons: None,
        meta: None,
        title: Some(T::KIND.canonical_name().into()),
    }
}

/// Wrap a JSON result as text plus structured content.
pub fn structured_result(value: Value) -> CallToolResult {
    let text = value.to_string();
    CallToolResult {
        content: vec![Content::text(text)],
        structured_content: Some(value),
        is_error: Some(false),
        meta: None,
    }
}

/// Create a ToolRoute for STDIO/TCP/HTTP MCP clients.
pub fn create_route<T, S>(ctx: ToolContext) -> ToolRoute<S>
where
    T: BioTool,
    S: Send + Sync + 'static,
{
    ToolRoute::new_dyn(to_tool::<T>(), move |call: ToolCallContext<'_, S>| {
        let args = Arguments::from_object(&call.arguments.clone().unwrap_or_default());
        let ctx = ctx.clone();
        async move {
            match run::<T>(&args, &ctx).await {
                Ok(value) => Ok(structured_result(value)),
                Err(ToolError::Validation(msg)) => Err(McpError::invalid_params(msg, None)),
                Err(e) => {
                    warn!("{} failed: {}", T::KIND.mcp_name(), e);
                    Ok(CallToolResult::error(vec![Content::text(
                        e.to_body().to_string(),
                    )]))
                }
            }
        }
        .boxed()
    })
}
