//! Resources domain module.
//!
//! Resources are read-only data exposed to MCP clients:
//!
//! - `bio://explorer/metrics` - explorer metrics and color scale
//! - `bio://tools/catalog` - the tool names and API paths
//! - `explorer://layer/{country}/{year}/{h3_res}/{metric}` - a rendered layer
//!
//! ## Adding a New Resource
//!
//! 1. Create a new file in `definitions/`
//! 2. Implement the `ResourceDefinition` trait
//! 3. Export in `definitions/mod.rs`
//! 4. Register in `registry.rs`

pub mod definitions;
mod error;
mod registry;
mod service;

pub use definitions::ResourceDefinition;
pub use error::ResourceError;
pub use registry::{get_all_resources, resource_uris};
pub use service::{ResourceContent, ResourceEntry, ResourceService};
