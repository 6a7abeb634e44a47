//! Biodiversity agent server.
//!
//! Exposes H3-gridded biodiversity data to conversational agents and to a
//! map explorer.
//!
//! # Architecture
//!
//! - **core**: configuration, errors, database access, JSON helpers, path
//!   security, the MCP server handler and transports
//! - **domains**: business logic organized by bounded contexts
//!   - **tools**: the seven query tools, their validation, and the agent
//!     invocation router
//!   - **explorer**: Parquet partition loading, layer selection, GeoJSON
//!     rendering and the view state machine
//!   - **resources**: read-only catalog and layer resources
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bio_agent_server::core::database::PgCatalog;
//! use bio_agent_server::core::{Config, McpServer, TransportService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let catalog = PgCatalog::new(
//!         config.database.credentials.clone(),
//!         config.database.schema.clone(),
//!         Duration::from_secs(config.database.connect_timeout_secs),
//!     );
//!     let server = McpServer::new(config.clone(), Arc::new(catalog));
//!     TransportService::new(config.transport).run(server).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

pub use core::{Config, Error, McpServer, Result};
