//! Resource definitions module.
//!
//! Each static resource is defined in its own file with its URI, metadata
//! and content. The explorer layer template lives in `explorer_layer.rs`.

mod explorer_layer;
mod explorer_metrics;
mod tool_catalog;

pub use explorer_layer::{LAYER_URI_TEMPLATE, LayerUri, layer_template};
pub use explorer_metrics::ExplorerMetricsResource;
pub use tool_catalog::ToolCatalogResource;

use super::service::ResourceContent;

/// Trait for static resource definitions.
pub trait ResourceDefinition {
    /// The unique URI of the resource.
    const URI: &'static str;

    /// The display name of the resource.
    const NAME: &'static str;

    /// A description of the resource.
    const DESCRIPTION: &'static str;

    /// The MIME type of the resource content.
    const MIME_TYPE: &'static str;

    /// Get the content for this resource.
    fn content() -> ResourceContent;
}
