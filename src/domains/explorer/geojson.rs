//! GeoJSON choropleth of a layer.

use h3o::CellIndex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::color::metric_to_color;
use super::layer::{Layer, metric_value, row_cell};
use crate::core::json::{Record, finite_number};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// One closed ring of `[lng, lat]` positions.
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Geometry,
    pub properties: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Closed boundary ring of a cell as `[lng, lat]` pairs.
pub fn cell_ring(cell: CellIndex) -> Vec<[f64; 2]> {
    let mut ring: Vec<[f64; 2]> = cell
        .boundary()
        .iter()
        .map(|vertex| [vertex.lng(), vertex.lat()])
        .collect();
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    ring
}

/// Build one polygon feature per row. Rows without a valid cell id are skipped.
///
/// Properties carry every row value plus `_color` and `_metric_value`.
pub fn build_feature_collection(layer: &Layer<'_>) -> FeatureCollection {
    let values: Vec<f64> = layer
        .rows
        .iter()
        .map(|row| metric_value(row, &layer.metric))
        .collect();
    if values.is_empty() {
        return FeatureCollection::empty();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let features = layer
        .rows
        .iter()
        .zip(values)
        .filter_map(|(row, value)| {
            let cell = row_cell(row)?;
            let mut properties = (*row).clone();
            properties.insert(
                "_color".to_string(),
                Value::String(metric_to_color(value, min, max)),
            );
            properties.insert("_metric_value".to_string(), finite_number(value));

            Some(Feature {
                kind: "Feature".to_string(),
                geometry: Geometry {
                    kind: "Polygon".to_string(),
                    coordinates: vec![cell_ring(cell)],
                },
                properties,
            })
        })
        .collect();

    FeatureCollection::new(features)
}
