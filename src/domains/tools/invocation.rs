//! Agent invocation router.
//!
//! An agent calls a tool with one of two envelope shapes: path based
//! (`apiPath`) or function based (`function`). Both are normalized into a
//! tool name plus one flat [`Arguments`] set, dispatched through the
//! [`ToolRegistry`], and wrapped back in the matching response envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{error, info, instrument, warn};

use super::arguments::Arguments;
use super::error::ToolError;
use super::registry::{ToolRegistry, resolve_tool};

/// Serialized responses above this size are logged at warn level.
pub const LARGE_RESPONSE_BYTES: usize = 5_000_000;

const MESSAGE_VERSION: &str = "1.0";

// ============================================================================
// Event
// ============================================================================

/// Incoming invocation. `function` selects the function-based shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEvent {
    pub api_path: Option<String>,
    pub function: Option<String>,
    pub http_method: Option<String>,
    pub action_group: Option<String>,
    pub parameters: Option<Value>,
    pub request_body: Option<Value>,
    pub session_attributes: Option<Value>,
    pub prompt_session_attributes: Option<Value>,
}

impl InvocationEvent {
    pub fn is_function_shape(&self) -> bool {
        self.function.is_some()
    }

    /// Tool key: the API path without its leading slash, else the function name.
    pub fn tool_key(&self) -> Option<String> {
        let path = self
            .api_path
            .as_deref()
            .map(|p| p.trim().trim_matches('/'))
            .filter(|p| !p.is_empty());
        let function = self
            .function
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty());
        path.or(function).map(str::to_string)
    }

    /// Merge the parameter list, then the request body properties.
    pub fn arguments(&self) -> Arguments {
        let mut args = Arguments::new();
        if let Some(Value::Array(entries)) = &self.parameters {
            insert_entries(&mut args, entries);
        }

        let properties = self
            .request_body
            .as_ref()
            .and_then(|body| body.pointer("/content/application~1json/properties"));
        match properties {
            Some(Value::Array(entries)) => insert_entries(&mut args, entries),
            Some(Value::Object(object)) => args.extend_object(object),
            _ => {}
        }
        args
    }
}

/// Insert `{name, value}` entries. Nameless entries are skipped, except a
/// single-key `{key: value}` shorthand.
fn insert_entries(args: &mut Arguments, entries: &[Value]) {
    for entry in entries.iter().filter_map(Value::as_object) {
        match entry.get("name").and_then(Value::as_str) {
            Some(name) => {
                if let Some(value) = entry.get("value") {
                    args.insert(name, value.clone());
                }
            }
            None => {
                if let Some((key, value)) = single_entry(entry) {
                    args.insert(key, value.clone());
                }
            }
        }
    }
}

fn single_entry(entry: &Map<String, Value>) -> Option<(&str, &Value)> {
    if entry.len() != 1 {
        return None;
    }
    entry
        .iter()
        .next()
        .filter(|(key, _)| key.as_str() != "value")
        .map(|(key, value)| (key.as_str(), value))
}

// ============================================================================
// Response envelopes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BodyText {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub action_group: String,
    pub api_path: String,
    pub http_method: String,
    pub http_status_code: u16,
    pub response_body: ApiResponseBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponseBody {
    #[serde(rename = "application/json")]
    pub json: BodyText,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub action_group: String,
    pub function: String,
    pub function_response: FunctionResponseBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponseBody {
    pub response_body: FunctionText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionText {
    #[serde(rename = "TEXT")]
    pub text: BodyText,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResponsePayload {
    Api(ApiResponse),
    Function(FunctionResponse),
}

/// Wrapped result returned to the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub message_version: String,
    pub response: ResponsePayload,
    pub session_attributes: Value,
    pub prompt_session_attributes: Value,
}

impl InvocationResponse {
    /// The decoded JSON body, whichever the shape.
    pub fn body(&self) -> Result<Value, serde_json::Error> {
        let text = match &self.response {
            ResponsePayload::Api(api) => &api.response_body.json.body,
            ResponsePayload::Function(func) => &func.function_response.response_body.text.body,
        };
        serde_json::from_str(text)
    }
}

fn attributes(value: &Option<Value>) -> Value {
    match value {
        Some(Value::Null) | None => json!({}),
        Some(v) => v.clone(),
    }
}

/// Wrap a body in the envelope matching the event's shape.
fn envelope(event: &InvocationEvent, body: &Value, error: Option<&ToolError>) -> InvocationResponse {
    let body = BodyText {
        body: body.to_string(),
    };
    let action_group = event.action_group.clone().unwrap_or_default();

    let response = if event.is_function_shape() {
        ResponsePayload::Function(FunctionResponse {
            action_group,
            function: event.function.clone().unwrap_or_default(),
            function_response: FunctionResponseBody {
                response_body: FunctionText { text: body },
                response_state: error.map(|e| e.response_state().to_string()),
            },
        })
    } else {
        ResponsePayload::Api(ApiResponse {
            action_group,
            api_path: event.api_path.clone().unwrap_or_default(),
            http_method: event
                .http_method
                .clone()
                .unwrap_or_else(|| "POST".to_string()),
            http_status_code: error.map_or(200, ToolError::status_code),
            response_body: ApiResponseBody { json: body },
        })
    };

    InvocationResponse {
        message_version: MESSAGE_VERSION.to_string(),
        response,
        session_attributes: attributes(&event.session_attributes),
        prompt_session_attributes: attributes(&event.prompt_session_attributes),
    }
}

// ============================================================================
// Router
// ============================================================================

/// Routes agent invocations to tools.
#[derive(Clone)]
pub struct ActionGroupRouter {
    registry: ToolRegistry,
}

impl ActionGroupRouter {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Decode a raw event, then invoke it. A malformed event is an
    /// invalid invocation answered in the path-based shape.
    pub async fn invoke_value(&self, raw: Value) -> InvocationResponse {
        match serde_json::from_value::<InvocationEvent>(raw) {
            Ok(event) => self.invoke(&event).await,
            Err(e) => {
                error!("Malformed invocation event: {}", e);
                let err = ToolError::invalid_invocation(e.to_string());
                envelope(&InvocationEvent::default(), &err.to_body(), Some(&err))
            }
        }
    }

    /// Resolve, dispatch and wrap one invocation. Never fails: errors are
    /// reported inside the envelope.
    #[instrument(skip_all, fields(api_path = ?event.api_path, function = ?event.function))]
    pub async fn invoke(&self, event: &InvocationEvent) -> InvocationResponse {
        info!(
            "Invocation received (action group {:?})",
            event.action_group.as_deref().unwrap_or_default()
        );

        let response = match self.call(event).await {
            Ok(body) => envelope(event, &body, None),
            Err(err) => {
                match &err {
                    ToolError::Validation(msg) => warn!("Validation error: {}", msg),
                    other => error!("Invocation failed: {}", other),
                }
                envelope(event, &err.to_body(), Some(&err))
            }
        };

        match serde_json::to_vec(&response) {
            Ok(bytes) if bytes.len() > LARGE_RESPONSE_BYTES => {
                warn!("Response very large ({} bytes)", bytes.len())
            }
            Ok(bytes) => info!("Response size: {} bytes", bytes.len()),
            Err(e) => warn!("Could not measure response size: {}", e),
        }
        response
    }

    async fn call(&self, event: &InvocationEvent) -> Result<Value, ToolError> {
        let key = event
            .tool_key()
            .ok_or_else(|| ToolError::invalid_invocation("Missing apiPath or function"))?;
        let args = event.arguments();
        let kind = resolve_tool(&key, &args)?;
        info!("Dispatching {} with keys {:?}", kind.canonical_name(), args.keys());
        self.registry.dispatch(kind, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::catalog::testing::FakeCatalog;
    use crate::domains::tools::handlers::ToolContext;
    use std::sync::Arc;

    fn router() -> ActionGroupRouter {
        ActionGroupRouter::new(ToolRegistry::new(ToolContext::new(Arc::new(FakeCatalog::new()))))
    }

    fn event(value: Value) -> InvocationEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parameter_merge_order() {
        let ev = event(json!({
            "apiPath": "/getNeighborHexes",
            "parameters": [
                {"name": "h3_id", "value": "first"},
                {"value": "nameless"},
                {"name": "k_ring", "value": 1}
            ],
            "requestBody": {"content": {"application/json": {"properties": [
                {"name": "k_ring", "value": 3},
                {"name": "kRing", "value": 2}
            ]}}}
        }));
        let args = ev.arguments();
        assert_eq!(args.get("h3_id"), Some(&json!("first")));
        assert_eq!(args.get("k_ring"), Some(&json!(3)));
        assert_eq!(args.keys(), vec!["h3_id", "k_ring"]);
    }

    #[test]
    fn test_body_properties_object() {
        let ev = event(json!({
            "function": "getOSMContext",
            "parameters": [{"name": "h3_res", "value": "6"}],
            "requestBody": {"content": {"application/json": {"properties": {"h3_res": 8, "h3Id": "abc"}}}}
        }));
        let args = ev.arguments();
        assert_eq!(args.get("h3_res"), Some(&json!(8)));
        assert_eq!(args.get("h3_id"), Some(&json!("abc")));
    }

    #[test]
    fn test_tool_key() {
        assert_eq!(event(json!({"apiPath": "/getHexMetrics"})).tool_key().as_deref(), Some("getHexMetrics"));
        assert_eq!(event(json!({"function": "GetOSMContext"})).tool_key().as_deref(), Some("GetOSMContext"));
        assert_eq!(event(json!({"apiPath": "/", "function": ""})).tool_key(), None);
    }

    #[tokio::test]
    async fn test_missing_tool_key_is_invalid_invocation() {
        let resp = router().invoke(&event(json!({"actionGroup": "bio"}))).await;
        match &resp.response {
            ResponsePayload::Api(api) => {
                assert_eq!(api.http_status_code, 400);
                assert_eq!(api.http_method, "POST");
                assert_eq!(api.action_group, "bio");
            }
            other => panic!("unexpected shape: {:?}", other),
        }
        assert_eq!(resp.body().unwrap()["error"], "InvalidInvocation");
        assert_eq!(resp.session_attributes, json!({}));
    }

    #[tokio::test]
    async fn test_function_shape_states() {
        let resp = router()
            .invoke(&event(json!({
                "function": "getNeighborHexes",
                "parameters": [{"name": "h3_id", "value": "8928308280fffff"}, {"name": "k_ring", "value": 7}],
                "sessionAttributes": {"user": "a"}
            })))
            .await;
        let ResponsePayload::Function(func) = &resp.response else {
            panic!("expected function shape");
        };
        assert_eq!(func.function_response.response_state.as_deref(), Some("REPROMPT"));
        assert_eq!(resp.body().unwrap()["error"], "ValidationError");
        assert_eq!(resp.session_attributes, json!({"user": "a"}));

        let resp = router()
            .invoke(&event(json!({"function": "getWeather"})))
            .await;
        let ResponsePayload::Function(func) = &resp.response else {
            panic!("expected function shape");
        };
        assert_eq!(func.function_response.response_state.as_deref(), Some("FAILURE"));
        assert_eq!(resp.body().unwrap()["tool"], "getWeather");
    }

    #[tokio::test]
    async fn test_success_has_no_response_state() {
        let resp = router()
            .invoke(&event(json!({
                "function": "action_group_quick_action1",
                "parameters": [{"name": "h3Id", "value": "8928308280fffff"}, {"name": "kRing", "value": "2"}, {"name": "h3_res", "value": 9}]
            })))
            .await;
        let encoded = serde_json::to_value(&resp).unwrap();
        assert!(encoded["response"]["functionResponse"].get("responseState").is_none());
        assert_eq!(resp.body().unwrap()["neighbor_count"], json!(18));
    }

    #[tokio::test]
    async fn test_malformed_event() {
        let resp = router().invoke_value(json!({"apiPath": 42})).await;
        let ResponsePayload::Api(api) = &resp.response else {
            panic!("expected api shape");
        };
        assert_eq!(api.http_status_code, 400);
    }
}
