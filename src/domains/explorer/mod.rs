//! Map explorer domain.
//!
//! Loads Parquet partitions of per-cell metrics, selects the cells to draw
//! for the current view, and turns them into a colored GeoJSON layer.
//! Clicks are resolved back to a row of the full partition.

pub mod cache;
pub mod click;
pub mod color;
pub mod detail;
mod error;
pub mod geojson;
pub mod layer;
pub mod partition;
pub mod service;
pub mod view_state;

pub use error::ExplorerError;
pub use partition::{ParquetStore, PartitionKey, PartitionStore};
pub use service::{
    ClickRequest, ClickResponse, ExplorerService, RenderResponse, SummaryRequest, SummaryResponse,
    ViewRequest,
};
pub use view_state::{Bounds, ViewEvent, ViewMode, ViewState, transition};
