//! Resource service implementation.
//!
//! The ResourceService manages resource discovery and access. Static
//! resources come from `registry.rs`; explorer layer URIs are rendered on
//! demand through the [`ExplorerService`].

use std::collections::BTreeMap;
use std::sync::Arc;

use rmcp::model::{ReadResourceResult, Resource, ResourceContents, ResourceTemplate};
use tracing::{debug, info};

use super::definitions::LayerUri;
use super::error::ResourceError;
use super::registry::{get_all_resource_templates, get_all_resources};
use crate::core::config::ResourcesConfig;
use crate::domains::explorer::ExplorerService;

const GEOJSON_MIME_TYPE: &str = "application/geo+json";

/// Service for managing and accessing resources.
pub struct ResourceService {
    /// Configuration for the resources domain.
    config: ResourcesConfig,

    /// Static resources keyed by URI.
    resources: BTreeMap<String, ResourceEntry>,

    /// Resource templates for parameterized resources.
    templates: Vec<ResourceTemplate>,

    /// Renders layer resources.
    explorer: Arc<ExplorerService>,
}

/// An entry in the resource registry.
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    /// The resource metadata.
    pub resource: Resource,

    /// The content of this resource.
    pub content: ResourceContent,
}

/// Static resource content.
#[derive(Debug, Clone)]
pub enum ResourceContent {
    Text(String),
}

impl ResourceService {
    pub fn new(config: ResourcesConfig, explorer: Arc<ExplorerService>) -> Self {
        info!("Initializing ResourceService");

        let resources = get_all_resources()
            .into_iter()
            .map(|entry| (entry.resource.raw.uri.clone(), entry))
            .collect();
        let templates = get_all_resource_templates(&config);

        Self {
            config,
            resources,
            templates,
            explorer,
        }
    }

    /// List all available resources.
    pub async fn list_resources(&self) -> Vec<Resource> {
        self.resources
            .values()
            .map(|entry| entry.resource.clone())
            .collect()
    }

    /// List all available resource templates.
    pub async fn list_resource_templates(&self) -> Vec<ResourceTemplate> {
        self.templates.clone()
    }

    /// Read a resource by URI.
    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, ResourceError> {
        if let Some(entry) = self.resources.get(uri) {
            let ResourceContent::Text(text) = &entry.content;
            return Ok(ReadResourceResult {
                contents: vec![ResourceContents::TextResourceContents {
                    uri: uri.to_string(),
                    mime_type: entry.resource.raw.mime_type.clone(),
                    text: text.clone(),
                    meta: None,
                }],
            });
        }

        match LayerUri::parse(uri) {
            Some(_) if !self.config.expose_explorer_layers => Err(ResourceError::not_found(uri)),
            Some(parsed) => self.read_layer(uri, parsed?).await,
            None => Err(ResourceError::not_found(uri)),
        }
    }

    async fn read_layer(
        &self,
        uri: &str,
        layer: LayerUri,
    ) -> Result<ReadResourceResult, ResourceError> {
        debug!("Rendering layer resource {:?}", layer);
        let rendered = self
            .explorer
            .layer(&layer.country, layer.year, layer.h3_res, &layer.metric)
            .await?;
        let text = serde_json::to_string(&rendered.geojson)
            .map_err(|e| ResourceError::internal(e.to_string()))?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::TextResourceContents {
                uri: uri.to_string(),
                mime_type: Some(GEOJSON_MIME_TYPE.to_string()),
                text,
                meta: None,
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ExplorerConfig;
    use crate::domains::explorer::partition::PartitionKey;
    use crate::domains::explorer::partition::testing::write_partition;
    use serde_json::Value;
    use tempfile::TempDir;

    fn service(root: &TempDir, config: ResourcesConfig) -> ResourceService {
        let key = PartitionKey::new("ES", 2024, 7).unwrap();
        write_partition(
            root.path(),
            &key,
            "part-0.parquet",
            &["872830828ffffff", "87283082bffffff"],
            &[Some(1.0), Some(2.0)],
        );
        let explorer = Arc::new(ExplorerService::new(ExplorerConfig {
            data_root: root.path().to_path_buf(),
            ..ExplorerConfig::default()
        }));
        ResourceService::new(config, explorer)
    }

    fn text(result: &ReadResourceResult) -> &str {
        match &result.contents[0] {
            ResourceContents::TextResourceContents { text, .. } => text,
            _ => panic!("Expected text contents"),
        }
    }

    #[tokio::test]
    async fn test_list_and_read_static() {
        let root = TempDir::new().unwrap();
        let service = service(&root, ResourcesConfig::default());

        assert_eq!(service.list_resources().await.len(), 2);
        assert_eq!(service.list_resource_templates().await.len(), 1);

        let result = service.read_resource("bio://tools/catalog").await.unwrap();
        assert!(text(&result).contains("getHexMetrics"));
    }

    #[tokio::test]
    async fn test_read_layer() {
        let root = TempDir::new().unwrap();
        let service = service(&root, ResourcesConfig::default());

        let result = service
            .read_resource("explorer://layer/ES/2024/7/species_richness_cell")
            .await
            .unwrap();
        let geojson: Value = serde_json::from_str(text(&result)).unwrap();
        assert_eq!(geojson["type"], "FeatureCollection");
        assert_eq!(geojson["features"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_read_errors() {
        let root = TempDir::new().unwrap();
        let service = service(&root, ResourcesConfig::default());

        assert!(matches!(
            service.read_resource("bio://nothing").await,
            Err(ResourceError::NotFound(_))
        ));
        assert!(matches!(
            service.read_resource("explorer://layer/ES/2024").await,
            Err(ResourceError::InvalidUri(_))
        ));
        assert!(matches!(
            service.read_resource("explorer://layer/ES/2024/12/dqi").await,
            Err(ResourceError::Explorer(_))
        ));
    }

    #[tokio::test]
    async fn test_layers_hidden_when_disabled() {
        let root = TempDir::new().unwrap();
        let service = service(
            &root,
            ResourcesConfig {
                expose_explorer_layers: false,
            },
        );

        assert!(service.list_resource_templates().await.is_empty());
        assert!(matches!(
            service.read_resource("explorer://layer/ES/2024/7/dqi").await,
            Err(ResourceError::NotFound(_))
        ));
    }
}
