//! Resource registry: the static resources plus the explorer layer
//! template, which is only advertised when layers are exposed.

use rmcp::model::{AnnotateAble, RawResource, ResourceTemplate};

use super::definitions::{
    ExplorerMetricsResource, ResourceDefinition, ToolCatalogResource, layer_template,
};
use super::service::ResourceEntry;
use crate::core::config::ResourcesConfig;

/// Registry entry for a static resource definition.
fn build_resource<R: ResourceDefinition>() -> ResourceEntry {
    let mut raw = RawResource::new(R::URI, R::NAME);
    raw.description = Some(R::DESCRIPTION.to_string());
    raw.mime_type = Some(R::MIME_TYPE.to_string());

    ResourceEntry {
        resource: raw.no_annotation(),
        content: R::content(),
    }
}

/// Get all registered static resources.
pub fn get_all_resources() -> Vec<ResourceEntry> {
    vec![
        build_resource::<ExplorerMetricsResource>(),
        build_resource::<ToolCatalogResource>(),
    ]
}

/// Get all registered resource templates.
///
/// Explorer layers are only advertised when enabled in the configuration.
pub fn get_all_resource_templates(config: &ResourcesConfig) -> Vec<ResourceTemplate> {
    if config.expose_explorer_layers {
        vec![layer_template()]
    } else {
        Vec::new()
    }
}

/// Get the list of all static resource URIs.
pub fn resource_uris() -> Vec<&'static str> {
    vec![ExplorerMetricsResource::URI, ToolCatalogResource::URI]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_all_resources() {
        let resources = get_all_resources();
        assert_eq!(resources.len(), 2);

        let uris: Vec<_> = resources
            .iter()
            .map(|r| r.resource.raw.uri.as_str())
            .collect();
        assert_eq!(uris, resource_uris());
    }

    #[test]
    fn test_templates_follow_config() {
        let enabled = ResourcesConfig::default();
        let templates = get_all_resource_templates(&enabled);
        assert_eq!(templates.len(), 1);
        assert_eq!(
            templates[0].raw.uri_template,
            "explorer://layer/{country}/{year}/{h3_res}/{metric}"
        );

        let disabled = ResourcesConfig {
            expose_explorer_layers: false,
        };
        assert!(get_all_resource_templates(&disabled).is_empty());
    }
}
