//! Explorer layer resource template.

use rmcp::model::{AnnotateAble, RawResourceTemplate, ResourceTemplate};

use crate::domains::resources::error::ResourceError;

pub const LAYER_URI_TEMPLATE: &str = "explorer://layer/{country}/{year}/{h3_res}/{metric}";

const LAYER_URI_PREFIX: &str = "explorer://layer/";

/// Template advertising top-N explorer layers as GeoJSON.
pub fn layer_template() -> ResourceTemplate {
    RawResourceTemplate {
        uri_template: LAYER_URI_TEMPLATE.to_string(),
        name: "Explorer Layer".to_string(),
        title: Some("H3 Metric Layer".to_string()),
        description: Some(
            "Top-N H3 cells of a country, year and resolution as a colored GeoJSON \
             FeatureCollection"
                .to_string(),
        ),
        mime_type: Some("application/geo+json".to_string()),
    }
    .no_annotation()
}

/// A filled-in layer URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerUri {
    pub country: String,
    pub year: i32,
    pub h3_res: u8,
    pub metric: String,
}

impl LayerUri {
    /// `None` when the URI is not a layer URI; an error when it is one but
    /// malformed.
    pub fn parse(uri: &str) -> Option<Result<Self, ResourceError>> {
        let rest = uri.strip_prefix(LAYER_URI_PREFIX)?;
        Some(Self::parse_segments(uri, rest))
    }

    fn parse_segments(uri: &str, rest: &str) -> Result<Self, ResourceError> {
        let segments: Vec<&str> = rest.split('/').collect();
        let [country, year, h3_res, metric] = segments.as_slice() else {
            return Err(ResourceError::invalid_uri(uri));
        };
        if country.is_empty() || metric.is_empty() {
            return Err(ResourceError::invalid_uri(uri));
        }
        Ok(Self {
            country: country.to_string(),
            year: year.parse().map_err(|_| ResourceError::invalid_uri(uri))?,
            h3_res: h3_res.parse().map_err(|_| ResourceError::invalid_uri(uri))?,
            metric: metric.to_string(),
        })
    }
}
