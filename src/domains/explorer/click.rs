//! Map click resolution.

use h3o::{CellIndex, LatLng, Resolution};

use super::error::ExplorerError;
use super::partition::Frame;
use crate::core::json::Record;

/// Cell containing a clicked coordinate at the given resolution.
pub fn resolve_click(lat: f64, lng: f64, h3_res: u8) -> Result<CellIndex, ExplorerError> {
    let resolution = Resolution::try_from(h3_res)
        .map_err(|e| ExplorerError::invalid_selection(e.to_string()))?;
    let point = LatLng::new(lat, lng)
        .map_err(|e| ExplorerError::invalid_coordinate(format!("({}, {}): {}", lat, lng, e)))?;
    Ok(point.to_cell(resolution))
}

/// Resolve a click and look the cell up in the full partition frame.
pub fn lookup_click<'a>(
    frame: &'a Frame,
    lat: f64,
    lng: f64,
    h3_res: u8,
) -> Result<(CellIndex, Option<&'a Record>), ExplorerError> {
    let cell = resolve_click(lat, lng, h3_res)?;
    Ok((cell, frame.find_cell(&cell.to_string())))
}
