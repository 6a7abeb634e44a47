//! Transport layer for the server.
//!
//! - **STDIO**: MCP over standard input/output - feature: `stdio`
//! - **TCP**: line-delimited JSON-RPC over a socket - feature: `tcp`
//! - **HTTP**: JSON-RPC at the configured path, agent invocations at
//!   `/invoke` and the map explorer under `/explorer/*` - feature: `http`
//!
//! Every transport delegates to the same [`McpServer`](crate::core::McpServer).
//!
//! # Feature Flags
//!
//! - `stdio` (default): minimal dependencies
//! - `tcp`: adds tokio/net
//! - `http`: adds axum, tower, tower-http

mod config;
mod error;
mod service;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use service::TransportService;

// Re-export configs for convenience
#[cfg(feature = "tcp")]
pub use config::TcpConfig;

#[cfg(feature = "http")]
pub use config::HttpConfig;
