//! Tool-specific error types.

use serde_json::{Value, json};
use thiserror::Error;

use crate::core::database::DatabaseError;

/// Errors that can occur during tool operations.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A parameter failed validation. The caller may re-prompt.
    #[error("{0}")]
    Validation(String),

    /// The requested tool could not be resolved.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The invocation names neither an API path nor a function.
    #[error("Invalid invocation: {0}")]
    InvalidInvocation(String),

    /// Database or connectivity failure.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Create a new validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new "unknown tool" error.
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool(name.into())
    }

    /// Create a new "invalid invocation" error.
    pub fn invalid_invocation(msg: impl Into<String>) -> Self {
        Self::InvalidInvocation(msg.into())
    }

    /// Create a new "internal" error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Error kind as reported in response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::UnknownTool(_) => "UnknownTool",
            Self::InvalidInvocation(_) => "InvalidInvocation",
            Self::Database(_) | Self::Internal(_) => "InternalError",
        }
    }

    /// HTTP-like status code for the invocation envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidInvocation(_) => 400,
            Self::UnknownTool(_) => 404,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Agent response state: `REPROMPT` for validation, `FAILURE` otherwise.
    pub fn response_state(&self) -> &'static str {
        match self {
            Self::Validation(_) => "REPROMPT",
            _ => "FAILURE",
        }
    }

    /// `{error, message}` body, plus `tool` for unknown tools.
    pub fn to_body(&self) -> Value {
        let message = match self {
            Self::UnknownTool(name) => format!("Unknown tool: {}", name),
            other => other.to_string(),
        };
        let mut body = json!({ "error": self.kind(), "message": message });
        if let (Self::UnknownTool(name), Some(obj)) = (self, body.as_object_mut()) {
            obj.insert("tool".to_string(), Value::String(name.clone()));
        }
        body
    }
}
