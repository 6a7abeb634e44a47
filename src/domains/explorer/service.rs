//! Explorer service: view events in, rendered layers out.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::cache::PartitionCache;
use super::click::lookup_click;
use super::color::Legend;
use super::detail::{DetailField, cell_details};
use super::error::ExplorerError;
use super::geojson::{FeatureCollection, build_feature_collection};
use super::layer::{COLOR_METRICS, metric_value, select_layer};
use super::partition::{Frame, ParquetStore, PartitionKey, PartitionStore};
use super::view_state::{ViewEvent, ViewMode, ViewState, transition};
use crate::core::config::ExplorerConfig;
use crate::core::json::{Record, as_f64, finite_number};

/// Default resolution of a fresh view.
pub const DEFAULT_H3_RES: u8 = 7;

/// Above this many hexes a viewport snapshot carries a warning.
pub const LARGE_LAYER_WARNING: usize = 10_000;

const TOP_TABLE_ROWS: usize = 10;

const TOP_TABLE_COLUMNS: [&str; 7] = [
    "h3_index",
    "species_richness_cell",
    "observation_count",
    "shannon_H",
    "n_threatened_species",
    "threat_score_weighted",
    "dqi",
];

const NO_DATA_MESSAGE: &str = "No data found for the selected country / year / resolution.";

fn default_true() -> bool {
    true
}

/// Body of `POST /explorer/view`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewRequest {
    /// Client-held state; a fresh default view when absent.
    #[serde(default)]
    pub state: Option<ViewState>,
    #[serde(default)]
    pub event: Option<ViewEvent>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub max_hexes: Option<usize>,
    #[serde(default = "default_true")]
    pub show_overlay: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderResponse {
    pub state: ViewState,
    pub mode_used: &'static str,
    pub was_sampled: bool,
    pub hex_count: usize,
    pub total_cells: usize,
    pub metric: String,
    pub map_key: String,
    pub widget_outputs: Vec<&'static str>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub legend: Legend,
    pub geojson: FeatureCollection,
}

/// Body of `POST /explorer/click`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClickRequest {
    pub state: ViewState,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClickResponse {
    pub h3_id: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<Record>,
    pub details: Vec<DetailField>,
    pub state: ViewState,
}

/// Body of `POST /explorer/summary`.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequest {
    pub country: String,
    pub year: i32,
    pub h3_res: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub metric: String,
    pub count: usize,
    pub min: Value,
    pub mean: Value,
    pub max: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    pub cell_count: usize,
    pub top_cells: Vec<Record>,
    pub metrics: Vec<MetricSummary>,
    pub caption: String,
}

fn status_caption(
    hex_count: usize,
    h3_res: u8,
    mode_used: &str,
    was_sampled: bool,
    metric: &str,
) -> String {
    let mut parts = vec![format!("{} hexagons drawn · res {}", hex_count, h3_res)];
    match mode_used {
        "viewport_snapshot" => parts.push("all cells in captured viewport".to_string()),
        "request_bounds" => parts.push("capturing viewport".to_string()),
        _ if was_sampled => parts.push(format!(
            "top-{} by {}, zoom in then add hexagons here for full local coverage",
            hex_count,
            metric.replace('_', " ")
        )),
        _ => {}
    }
    parts.join(" · ")
}

/// Top rows by species richness, restricted to the summary columns.
pub fn top_cells(frame: &Frame, limit: usize) -> Vec<Record> {
    if !frame.has_column("species_richness_cell") {
        return Vec::new();
    }
    let mut rows: Vec<&Record> = frame
        .rows
        .iter()
        .filter(|row| as_f64(row.get("species_richness_cell")).is_some())
        .collect();
    rows.sort_by(|a, b| {
        metric_value(b, "species_richness_cell").total_cmp(&metric_value(a, "species_richness_cell"))
    });
    rows.into_iter()
        .take(limit)
        .map(|row| {
            TOP_TABLE_COLUMNS
                .iter()
                .filter(|c| frame.has_column(c))
                .map(|c| (c.to_string(), row.get(*c).cloned().unwrap_or(Value::Null)))
                .collect()
        })
        .collect()
}

/// Count, min, mean and max over the non-null values of each color metric
/// present in the frame.
pub fn metric_summaries(frame: &Frame) -> Vec<MetricSummary> {
    COLOR_METRICS
        .iter()
        .filter(|m| frame.has_column(m))
        .map(|metric| {
            let values: Vec<f64> = frame
                .rows
                .iter()
                .filter_map(|row| as_f64(row.get(*metric)))
                .collect();
            let count = values.len();
            let (min, mean, max) = if count == 0 {
                (Value::Null, Value::Null, Value::Null)
            } else {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mean = values.iter().sum::<f64>() / count as f64;
                (finite_number(min), finite_number(mean), finite_number(max))
            };
            MetricSummary {
                metric: metric.to_string(),
                count,
                min,
                mean,
                max,
            }
        })
        .collect()
}

/// Map explorer entry point shared by the REST routes and MCP resources.
pub struct ExplorerService {
    cache: PartitionCache,
    config: ExplorerConfig,
}

impl ExplorerService {
    pub fn new(config: ExplorerConfig) -> Self {
        let store = Arc::new(ParquetStore::new(&config.data_root, config.allow_symlinks));
        Self::with_store(config, store)
    }

    pub fn with_store(config: ExplorerConfig, store: Arc<dyn PartitionStore>) -> Self {
        let cache = PartitionCache::new(store, Duration::from_secs(config.cache_ttl_secs));
        Self { cache, config }
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn default_state(&self) -> ViewState {
        ViewState::new(
            self.config.default_country.clone(),
            self.config.default_year,
            DEFAULT_H3_RES,
        )
    }

    async fn frame(&self, state: &ViewState) -> Result<Arc<Frame>, ExplorerError> {
        let key = PartitionKey::new(&state.country, state.year, state.h3_res)?;
        self.cache.get(&key).await
    }

    /// Apply an optional event, then render the resulting view.
    #[instrument(skip_all, fields(event = ?request.event))]
    pub async fn render(&self, request: ViewRequest) -> Result<RenderResponse, ExplorerError> {
        let state = request.state.unwrap_or_else(|| self.default_state());
        let mut state = match &request.event {
            Some(event) => transition(state, event),
            None => state,
        };
        state.country = state.country.trim().to_ascii_uppercase();

        let frame = self.frame(&state).await?;
        let requested_metric = request.metric.as_deref().unwrap_or(COLOR_METRICS[0]);
        let max_hexes = request.max_hexes.unwrap_or(self.config.max_hexes);
        let layer = select_layer(&frame, requested_metric, max_hexes, &state.mode);

        let hex_count = layer.rows.len();
        let geojson = if request.show_overlay {
            build_feature_collection(&layer)
        } else {
            FeatureCollection::empty()
        };

        let message = frame.is_empty().then(|| NO_DATA_MESSAGE.to_string());
        let warning = (layer.mode_used == "viewport_snapshot" && hex_count > LARGE_LAYER_WARNING)
            .then(|| {
                format!(
                    "Rendering {} hexagons. This may be slow at high resolutions.",
                    hex_count
                )
            });
        let caption_mode = match state.mode {
            ViewMode::RequestBounds { .. } => state.mode.name(),
            _ => layer.mode_used,
        };
        let status = status_caption(
            hex_count,
            state.h3_res,
            caption_mode,
            layer.was_sampled,
            &layer.metric,
        );

        info!(
            "Rendered {} of {} cells ({}) for {}/{}/{}",
            hex_count,
            frame.len(),
            layer.mode_used,
            state.country,
            state.year,
            state.h3_res
        );

        Ok(RenderResponse {
            mode_used: layer.mode_used,
            was_sampled: layer.was_sampled,
            hex_count,
            total_cells: frame.len(),
            legend: Legend::for_metric(&layer.metric),
            metric: layer.metric,
            map_key: state.map_key(),
            widget_outputs: state.mode.widget_outputs(),
            status,
            warning,
            message,
            geojson,
            state,
        })
    }

    /// Resolve a click against the full partition. An unknown cell leaves
    /// the selection as it was.
    #[instrument(skip_all, fields(lat = request.lat, lng = request.lng))]
    pub async fn click(&self, request: ClickRequest) -> Result<ClickResponse, ExplorerError> {
        let frame = self.frame(&request.state).await?;
        let (cell, row) = lookup_click(&frame, request.lat, request.lng, request.state.h3_res)?;
        let h3_id = cell.to_string();

        match row {
            Some(row) => {
                debug!("Click resolved to {}", h3_id);
                let state = transition(
                    request.state,
                    &ViewEvent::CellSelected {
                        h3_id: h3_id.clone(),
                    },
                );
                Ok(ClickResponse {
                    h3_id,
                    found: true,
                    details: cell_details(row),
                    cell: Some(row.clone()),
                    state,
                })
            }
            None => Ok(ClickResponse {
                h3_id,
                found: false,
                cell: None,
                details: Vec::new(),
                state: request.state,
            }),
        }
    }

    /// Top-10 table and per-metric statistics for a partition.
    #[instrument(skip(self))]
    pub async fn summary(
        &self,
        country: &str,
        year: i32,
        h3_res: u8,
    ) -> Result<SummaryResponse, ExplorerError> {
        let key = PartitionKey::new(country, year, h3_res)?;
        let frame = self.cache.get(&key).await?;
        Ok(SummaryResponse {
            cell_count: frame.len(),
            top_cells: top_cells(&frame, TOP_TABLE_ROWS),
            metrics: metric_summaries(&frame),
            caption: format!("{} cells · res {} · {}", frame.len(), key.h3_res, key.country),
        })
    }

    /// Top-N layer of a partition as GeoJSON, for resource reads.
    pub async fn layer(
        &self,
        country: &str,
        year: i32,
        h3_res: u8,
        metric: &str,
    ) -> Result<RenderResponse, ExplorerError> {
        self.render(ViewRequest {
            state: Some(ViewState::new(country, year, h3_res)),
            metric: Some(metric.to_string()),
            show_overlay: true,
            ..ViewRequest::default()
        })
        .await
    }
}
