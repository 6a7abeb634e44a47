//! HTTP transport implementation.
//!
//! HTTP server with JSON-RPC over POST requests, plus REST routes for the
//! agent invocation envelope and the map explorer:
//!
//! - `POST {rpc_path}` - MCP JSON-RPC
//! - `POST /invoke` - agent invocation envelope in, wrapped envelope out
//! - `POST /explorer/view`, `/explorer/click`, `/explorer/summary`
//! - `GET /health`, `GET /`

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use super::{TransportError, TransportResult, config::HttpConfig};
use crate::core::McpServer;
use crate::domains::explorer::{ClickRequest, ExplorerError, SummaryRequest, ViewRequest};
use crate::domains::resources::ResourceError;
use crate::domains::tools::ToolError;

const PROTOCOL_VERSION: &str = "2024-11-05";
const JSONRPC_VERSION: &str = "2.0";

/// HTTP transport handler.
pub struct HttpTransport {
    config: HttpConfig,
}

/// Incoming JSON-RPC 2.0 message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Outgoing JSON-RPC 2.0 message: exactly one of `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcFailure>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcFailure {
    pub code: i32,
    pub message: String,
}

impl RpcFailure {
    const INVALID_REQUEST: i32 = -32600;
    const METHOD_NOT_FOUND: i32 = -32601;
    const INVALID_PARAMS: i32 = -32602;
    const INTERNAL: i32 = -32603;

    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }
}

impl JsonRpcResponse {
    fn reply(id: Option<Value>, outcome: Result<Value, RpcFailure>) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(failure) => (None, Some(failure)),
        };
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
            error,
        }
    }
}

/// Required string member of the request params.
fn param_str<'a>(params: Option<&'a Value>, key: &str, missing: &str) -> Result<&'a str, RpcFailure> {
    let params = params.ok_or_else(|| RpcFailure::invalid_params("Missing params"))?;
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcFailure::invalid_params(missing))
}

/// Application state shared across HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    server: McpServer,
    rpc_path: String,
}

/// Explorer failure rendered as `{error, message}` with its status code.
struct ExplorerFailure(ExplorerError);

impl IntoResponse for ExplorerFailure {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!("Explorer request failed: {}", self.0);
        }
        let kind = match &self.0 {
            ExplorerError::InvalidSelection(_) | ExplorerError::InvalidCoordinate(_) => {
                "ValidationError"
            }
            ExplorerError::PathSecurity(_) => "AccessDenied",
            _ => "InternalError",
        };
        (
            status,
            Json(serde_json::json!({"error": kind, "message": self.0.to_string()})),
        )
            .into_response()
    }
}

impl From<ExplorerError> for ExplorerFailure {
    fn from(err: ExplorerError) -> Self {
        Self(err)
    }
}

impl HttpTransport {
    /// Create a new HTTP transport with the given config.
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Build the router for a server.
    pub fn router(&self, server: McpServer) -> Router {
        let state = AppState {
            server,
            rpc_path: self.config.rpc_path.clone(),
        };

        let mut app = Router::new()
            .route(&self.config.rpc_path, post(handle_rpc))
            .route("/invoke", post(handle_invoke))
            .route("/explorer/view", post(handle_explorer_view))
            .route("/explorer/click", post(handle_explorer_click))
            .route("/explorer/summary", post(handle_explorer_summary))
            .route("/health", get(health_check))
            .route("/", get(root_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            app = app.layer(cors);
        }
        app
    }

    /// Run the HTTP transport.
    pub async fn run(self, server: McpServer) -> TransportResult<()> {
        let addr = self.address();
        let app = self.router(server);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        let cors_status = if self.config.enable_cors {
            "enabled"
        } else {
            "disabled"
        };
        info!(
            "Ready - listening on {} (JSON-RPC over HTTP, CORS {})",
            addr, cors_status
        );
        info!("  → JSON-RPC: POST {}", self.config.rpc_path);
        info!("  → Agent:    POST /invoke");
        info!("  → Explorer: POST /explorer/{{view,click,summary}}");
        info!("  → Health:   GET /health");

        axum::serve(listener, app)
            .await
            .map_err(|e| TransportError::http(e.to_string()))?;

        Ok(())
    }
}

/// Root handler - provides API info.
async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": state.server.name(),
        "version": state.server.version(),
        "transport": "HTTP",
        "endpoints": {
            "rpc": state.rpc_path,
            "invoke": "/invoke",
            "explorer": ["/explorer/view", "/explorer/click", "/explorer/summary"],
            "health": "/health"
        },
        "protocol": "JSON-RPC 2.0",
        "tools": state.server.list_tools().len()
    }))
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Agent invocation envelope. Always answers 200; the envelope carries the
/// tool status.
#[instrument(skip_all)]
async fn handle_invoke(State(state): State<AppState>, Json(event): Json<Value>) -> impl IntoResponse {
    Json(state.server.invocations().invoke_value(event).await)
}

#[instrument(skip_all)]
async fn handle_explorer_view(
    State(state): State<AppState>,
    Json(request): Json<ViewRequest>,
) -> Result<impl IntoResponse, ExplorerFailure> {
    Ok(Json(state.server.explorer().render(request).await?))
}

#[instrument(skip_all)]
async fn handle_explorer_click(
    State(state): State<AppState>,
    Json(request): Json<ClickRequest>,
) -> Result<impl IntoResponse, ExplorerFailure> {
    Ok(Json(state.server.explorer().click(request).await?))
}

#[instrument(skip_all)]
async fn handle_explorer_summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> Result<impl IntoResponse, ExplorerFailure> {
    let summary = state
        .server
        .explorer()
        .summary(&request.country, request.year, request.h3_res)
        .await?;
    Ok(Json(summary))
}

/// JSON-RPC endpoint. Protocol errors travel in the body, so the HTTP
/// status is always 200.
#[instrument(skip_all, fields(method = %request.method))]
async fn handle_rpc(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    info!("JSON-RPC {}", request.method);
    let outcome = if request.jsonrpc == JSONRPC_VERSION {
        dispatch_rpc(&state, &request.method, request.params.as_ref()).await
    } else {
        Err(RpcFailure::new(RpcFailure::INVALID_REQUEST, "Invalid Request"))
    };
    Json(JsonRpcResponse::reply(request.id, outcome))
}

async fn dispatch_rpc(
    state: &AppState,
    method: &str,
    params: Option<&Value>,
) -> Result<Value, RpcFailure> {
    let server = &state.server;
    match method {
        "initialize" => Ok(serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}, "resources": {}},
            "serverInfo": {"name": server.name(), "version": server.version()},
            "instructions": server.instructions()
        })),
        "tools/list" => Ok(serde_json::json!({ "tools": server.list_tools() })),
        "tools/call" => rpc_tools_call(server, params).await,
        "resources/list" => Ok(serde_json::json!({ "resources": server.list_resources().await })),
        "resources/templates/list" => Ok(serde_json::json!({
            "resourceTemplates": server.list_resource_templates().await
        })),
        "resources/read" => rpc_resources_read(server, params).await,
        // Stateless HTTP: notifications are acknowledged with a null result
        m if m.starts_with("notifications/") => Ok(Value::Null),
        other => {
            warn!("Unsupported JSON-RPC method: {}", other);
            Err(RpcFailure::new(RpcFailure::METHOD_NOT_FOUND, "Method not found"))
        }
    }
}

/// Validation and unknown-tool errors are protocol errors; anything else
/// is a tool result flagged `isError`.
async fn rpc_tools_call(server: &McpServer, params: Option<&Value>) -> Result<Value, RpcFailure> {
    let name = param_str(params, "name", "Missing tool name")?;
    let arguments = params
        .and_then(|p| p.get("arguments"))
        .cloned()
        .unwrap_or(Value::Null);

    match server.call_tool(name, arguments).await {
        Ok(result) => Ok(result),
        Err(ToolError::Validation(msg)) => Err(RpcFailure::invalid_params(msg)),
        Err(ToolError::UnknownTool(tool)) => {
            Err(RpcFailure::invalid_params(format!("Unknown tool: {}", tool)))
        }
        Err(e) => {
            warn!("Tool {} failed: {}", name, e);
            Ok(serde_json::json!({
                "content": [{"type": "text", "text": e.to_body().to_string()}],
                "isError": true
            }))
        }
    }
}

async fn rpc_resources_read(server: &McpServer, params: Option<&Value>) -> Result<Value, RpcFailure> {
    let uri = param_str(params, "uri", "Missing resource URI")?;
    server.read_resource(uri).await.map_err(|e| match e {
        ResourceError::NotFound(_) | ResourceError::InvalidUri(_) => {
            RpcFailure::invalid_params(e.to_string())
        }
        other => {
            warn!("Reading {} failed: {}", uri, other);
            RpcFailure::new(RpcFailure::INTERNAL, other.to_string())
        }
    })
}
