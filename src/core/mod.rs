//! Core module containing shared infrastructure components.
//!
//! Configuration, error handling, database access, JSON value helpers,
//! filesystem security, the MCP server handler and the transport layer.

pub mod config;
pub mod database;
pub mod error;
pub mod json;
pub mod security;
pub mod server;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
pub use security::{PathSecurityError, validate_data_path};
pub use server::McpServer;
pub use transport::{TransportConfig, TransportService};
