//! Tools domain module.
//!
//! The seven biodiversity tools, reachable two ways: as MCP tools through
//! the rmcp router, and as agent invocations through the action group
//! router. Both paths share argument normalization, validation and the
//! [`ToolRegistry`] dispatch.
//!
//! ## Architecture
//!
//! - `definitions/` - Individual tool implementations (one file per tool)
//! - `arguments.rs` - camelCase/snake_case parameter normalization
//! - `validation.rs` - Shared parameter checks
//! - `handlers.rs` - The [`BioTool`] seam and the generic MCP route
//! - `registry.rs` - Tool names, quick-action inference and dispatch
//! - `router.rs` - ToolRouter builder for MCP transports
//! - `invocation.rs` - Agent invocation envelopes
//! - `error.rs` - Tool-specific error types

pub mod arguments;
pub mod definitions;
mod error;
mod handlers;
pub mod invocation;
pub mod registry;
pub mod router;
pub mod validation;

pub use arguments::Arguments;
pub use error::ToolError;
pub use handlers::*;
pub use invocation::{ActionGroupRouter, InvocationEvent, InvocationResponse};
pub use registry::{ToolKind, ToolRegistry};
pub use router::build_tool_router;
