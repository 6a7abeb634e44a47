//! Explorer metric catalog resource.

use serde_json::json;

use super::ResourceDefinition;
use crate::domains::explorer::color::{COLOR_STOPS, metric_title};
use crate::domains::explorer::detail::DETAIL_METRICS;
use crate::domains::explorer::layer::{COLOR_METRICS, FALLBACK_METRIC, MAX_HEXES_CAP};
use crate::domains::explorer::partition::{MAX_EXPLORER_RESOLUTION, MIN_EXPLORER_RESOLUTION};
use crate::domains::resources::service::ResourceContent;

/// Metrics the explorer can color by, plus the color scale.
pub struct ExplorerMetricsResource;

impl ResourceDefinition for ExplorerMetricsResource {
    const URI: &'static str = "bio://explorer/metrics";
    const NAME: &'static str = "Explorer Metrics";
    const DESCRIPTION: &'static str =
        "Color metrics, detail fields and the choropleth scale used by the map explorer";
    const MIME_TYPE: &'static str = "application/json";

    fn content() -> ResourceContent {
        let color_metrics: Vec<_> = COLOR_METRICS
            .iter()
            .map(|m| json!({"name": m, "title": metric_title(m)}))
            .collect();
        let stops: Vec<_> = COLOR_STOPS
            .iter()
            .map(|(t, color)| json!({"position": t, "color": color}))
            .collect();

        ResourceContent::Text(
            json!({
                "color_metrics": color_metrics,
                "fallback_metric": FALLBACK_METRIC,
                "detail_metrics": DETAIL_METRICS,
                "color_scale": {"name": "YlOrRd", "stops": stops},
                "resolutions": {"min": MIN_EXPLORER_RESOLUTION, "max": MAX_EXPLORER_RESOLUTION},
                "max_hexes_cap": MAX_HEXES_CAP,
            })
            .to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_explorer_metrics_content() {
        let ResourceContent::Text(text) = ExplorerMetricsResource::content();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["color_metrics"].as_array().unwrap().len(), 5);
        assert_eq!(value["color_metrics"][2]["title"], "Shannon H");
        assert_eq!(value["color_scale"]["stops"][0]["color"], "#ffffb2");
        assert_eq!(value["resolutions"]["max"], 9);
    }
}
