//! Layer selection: which cells of a partition get drawn.

use h3o::{CellIndex, LatLng};
use serde_json::Value;

use super::partition::Frame;
use super::view_state::ViewMode;
use crate::core::json::{Record, as_f64};

/// Metrics the map can be colored by.
pub const COLOR_METRICS: [&str; 5] = [
    "species_richness_cell",
    "observation_count",
    "shannon_H",
    "simpson_1_minus_D",
    "n_threatened_species",
];

/// Used when the requested metric column is absent.
pub const FALLBACK_METRIC: &str = "observation_count";

/// Hard cap on the top-N count.
pub const MAX_HEXES_CAP: usize = 20_000;

/// The metric column actually used for a frame.
pub fn resolve_metric<'a>(frame: &Frame, requested: &'a str) -> &'a str {
    if frame.has_column(requested) {
        requested
    } else {
        FALLBACK_METRIC
    }
}

/// Numeric metric value of a row; missing or non-numeric reads as 0.
pub fn metric_value(row: &Record, metric: &str) -> f64 {
    as_f64(row.get(metric)).unwrap_or(0.0)
}

/// Parse a row's `h3_index`.
pub fn row_cell(row: &Record) -> Option<CellIndex> {
    row.get("h3_index")
        .and_then(Value::as_str)
        .and_then(|id| id.parse::<CellIndex>().ok())
}

/// Center of a row's cell as (lat, lng) degrees.
pub fn row_center(row: &Record) -> Option<(f64, f64)> {
    row_cell(row).map(|cell| {
        let center = LatLng::from(cell);
        (center.lat(), center.lng())
    })
}

/// Rows chosen for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer<'a> {
    pub rows: Vec<&'a Record>,
    pub metric: String,
    pub was_sampled: bool,
    /// `top_n` or `viewport_snapshot`; the requested mode for an empty frame.
    pub mode_used: &'static str,
}

/// Select the rows to draw for the given mode.
///
/// A viewport snapshot keeps every row whose cell center lies inside the
/// bounds; an empty result falls back to top-N. Top-N keeps the `max_hexes`
/// largest rows (stable, capped at [`MAX_HEXES_CAP`]) when the frame is
/// larger, and the frame as is otherwise.
pub fn select_layer<'a>(
    frame: &'a Frame,
    requested_metric: &str,
    max_hexes: usize,
    mode: &ViewMode,
) -> Layer<'a> {
    let metric = resolve_metric(frame, requested_metric).to_string();

    if frame.is_empty() {
        return Layer {
            rows: Vec::new(),
            metric,
            was_sampled: false,
            mode_used: mode.name(),
        };
    }

    if let ViewMode::ViewportSnapshot { bounds } = mode {
        let inside: Vec<&Record> = frame
            .rows
            .iter()
            .filter(|row| row_center(row).is_some_and(|(lat, lng)| bounds.contains(lat, lng)))
            .collect();
        if !inside.is_empty() {
            return Layer {
                rows: inside,
                metric,
                was_sampled: false,
                mode_used: "viewport_snapshot",
            };
        }
    }

    let limit = max_hexes.min(MAX_HEXES_CAP);
    let mut rows: Vec<&Record> = frame.rows.iter().collect();
    let was_sampled = rows.len() > limit;
    if was_sampled {
        rows.sort_by(|a, b| metric_value(b, &metric).total_cmp(&metric_value(a, &metric)));
        rows.truncate(limit);
    }

    Layer {
        rows,
        metric,
        was_sampled,
        mode_used: "top_n",
    }
}
