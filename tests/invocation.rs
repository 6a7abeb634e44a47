//! End-to-end agent invocations against an in-memory catalog.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use bio_agent_server::core::database::{Catalog, CatalogSession, DatabaseError, SchemaName, SqlQuery};
use bio_agent_server::core::json::{Record, finite_number};
use bio_agent_server::domains::tools::{ActionGroupRouter, ToolContext, ToolRegistry};

/// Catalog answering every query whose SQL contains `needle` with `rows`.
#[derive(Default)]
struct CannedCatalog {
    schema: SchemaName,
    canned: Vec<(&'static str, Vec<Record>)>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl CannedCatalog {
    fn with_rows(mut self, needle: &'static str, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.canned.push((needle, rows));
        self
    }
}

struct CannedSession {
    canned: Vec<(&'static str, Vec<Record>)>,
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Catalog for CannedCatalog {
    fn schema(&self) -> &SchemaName {
        &self.schema
    }

    async fn session(&self) -> Result<Box<dyn CatalogSession>, DatabaseError> {
        Ok(Box::new(CannedSession {
            canned: self.canned.clone(),
            seen: Arc::clone(&self.seen),
        }))
    }
}

#[async_trait]
impl CatalogSession for CannedSession {
    async fn fetch_all(&mut self, query: &SqlQuery) -> Result<Vec<Record>, DatabaseError> {
        self.seen.lock().unwrap().push(query.sql.clone());
        Ok(self
            .canned
            .iter()
            .find(|(needle, _)| query.sql.contains(needle))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn close(self: Box<Self>) {}
}

fn router(catalog: CannedCatalog) -> ActionGroupRouter {
    ActionGroupRouter::new(ToolRegistry::new(ToolContext::new(Arc::new(catalog))))
}

async fn invoke(router: &ActionGroupRouter, event: Value) -> Value {
    let response = router.invoke_value(event).await;
    serde_json::to_value(&response).unwrap()
}

fn api_body(envelope: &Value) -> Value {
    let text = envelope["response"]["responseBody"]["application/json"]["body"]
        .as_str()
        .unwrap();
    serde_json::from_str(text).unwrap()
}

fn function_body(envelope: &Value) -> Value {
    let text = envelope["response"]["functionResponse"]["responseBody"]["TEXT"]["body"]
        .as_str()
        .unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn test_hex_metrics_without_rows() {
    let catalog = CannedCatalog::default();
    let seen = Arc::clone(&catalog.seen);
    let router = router(catalog);

    let envelope = invoke(
        &router,
        json!({
            "actionGroup": "bio",
            "apiPath": "/getHexMetrics",
            "httpMethod": "POST",
            "parameters": [{"h3_id": "8928308280fffff"}, {"h3_res": "7"}],
        }),
    )
    .await;

    assert_eq!(envelope["messageVersion"], json!("1.0"));
    assert_eq!(envelope["response"]["actionGroup"], json!("bio"));
    assert_eq!(envelope["response"]["apiPath"], json!("/getHexMetrics"));
    assert_eq!(envelope["response"]["httpStatusCode"], json!(200));
    assert_eq!(
        api_body(&envelope),
        json!({
            "h3_id": "8928308280fffff",
            "h3_resolution": 7,
            "metrics": [],
            "trend": null,
        })
    );

    let queries = seen.lock().unwrap();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("gbif_cell_metrics"));
}

#[tokio::test]
async fn test_hex_metrics_trend_from_rows() {
    let router = router(CannedCatalog::default().with_rows(
        "gbif_cell_metrics",
        vec![
            json!({"year": 2020, "species_richness_cell": 10, "n_threatened_species": 1, "dqi": 0.5}),
            json!({"year": 2023, "species_richness_cell": 14, "n_threatened_species": 3, "dqi": 0.75}),
        ],
    ));

    let envelope = invoke(
        &router,
        json!({
            "apiPath": "/getHexMetrics",
            "requestBody": {"content": {"application/json": {"properties": [
                {"name": "h3_id", "value": "8928308280fffff"},
                {"name": "h3_res", "value": 9},
            ]}}},
        }),
    )
    .await;

    let body = api_body(&envelope);
    assert_eq!(body["metrics"].as_array().unwrap().len(), 2);
    assert_eq!(body["trend"]["species_richness_change"], json!(4));
    assert_eq!(body["trend"]["threatened_change"], json!(2));
}

#[tokio::test]
async fn test_quick_action_with_k_ring_lists_neighbors() {
    let router = router(CannedCatalog::default());

    let envelope = invoke(
        &router,
        json!({
            "apiPath": "/action_group_quick_action1",
            "parameters": [
                {"name": "h3_id", "value": "8928308280fffff"},
                {"name": "h3_res", "value": "9"},
                {"name": "k_ring", "value": "1"},
            ],
        }),
    )
    .await;

    assert_eq!(envelope["response"]["httpStatusCode"], json!(200));
    let body = api_body(&envelope);
    assert_eq!(body["h3_id"], json!("8928308280fffff"));
    assert_eq!(body["neighbor_count"], json!(6));
    assert_eq!(body["k_ring"], json!(1));
}

#[tokio::test]
async fn test_quick_action_with_h3_ids_summarizes() {
    let router = router(
        CannedCatalog::default()
            .with_rows("MAX(year)", vec![json!({"max_year": 2022})])
            .with_rows(
                "gbif_cell_metrics",
                vec![
                    json!({"h3_index": "8928308280fffff", "species_richness_cell": 12, "n_threatened_species": 2, "dqi": 0.5, "threat_score_weighted": 4.0}),
                    json!({"h3_index": "8928308280bffff", "species_richness_cell": 8, "n_threatened_species": 1, "dqi": 0.7, "threat_score_weighted": 2.0}),
                ],
            ),
    );

    let envelope = invoke(
        &router,
        json!({
            "apiPath": "quick_action",
            "parameters": [
                {"name": "h3Ids", "value": "8928308280fffff, 8928308280bffff"},
                {"name": "h3Res", "value": "9"},
            ],
        }),
    )
    .await;

    assert_eq!(envelope["response"]["httpStatusCode"], json!(200));
    let body = api_body(&envelope);
    assert_eq!(body["year"], json!(2022));
    assert_eq!(body["summary"]["cell_count"], json!(2));
    assert_eq!(body["summary"]["total_threatened"], json!(3));
    assert_eq!(body["summary"]["mean_richness"], json!(10.0));
    assert_eq!(
        body["top_risky_neighbors"][0]["h3_index"],
        json!("8928308280fffff")
    );
}

#[tokio::test]
async fn test_unresolvable_quick_action_is_unknown_tool() {
    let router = router(CannedCatalog::default());

    let envelope = invoke(
        &router,
        json!({"apiPath": "/quick_action", "parameters": [{"name": "year", "value": 2022}]}),
    )
    .await;

    assert_eq!(envelope["response"]["httpStatusCode"], json!(404));
    let body = api_body(&envelope);
    assert_eq!(body["error"], json!("UnknownTool"));
    assert_eq!(body["tool"], json!("quick_action"));
}

#[tokio::test]
async fn test_function_shape_validation_reprompts() {
    let router = router(CannedCatalog::default());

    let envelope = invoke(
        &router,
        json!({
            "actionGroup": "bio",
            "function": "getHexMetrics",
            "parameters": [{"name": "h3_res", "value": 7}],
        }),
    )
    .await;

    assert_eq!(envelope["response"]["function"], json!("getHexMetrics"));
    assert_eq!(
        envelope["response"]["functionResponse"]["responseState"],
        json!("REPROMPT")
    );
    assert_eq!(function_body(&envelope)["error"], json!("ValidationError"));
}

#[tokio::test]
async fn test_non_finite_values_reach_both_shapes_as_null() {
    let row = json!({
        "year": 2022,
        "species_richness_cell": 5,
        "shannon_H": finite_number(f64::NAN),
        "dqi": finite_number(f64::INFINITY),
    });
    let router = router(CannedCatalog::default().with_rows("gbif_cell_metrics", vec![row]));
    let params = json!([{"name": "h3_id", "value": "8928308280fffff"}]);

    let api = invoke(
        &router,
        json!({"apiPath": "/getHexMetrics", "parameters": params.clone()}),
    )
    .await;
    let func = invoke(
        &router,
        json!({"function": "getHexMetrics", "parameters": params}),
    )
    .await;

    for body in [api_body(&api), function_body(&func)] {
        let metric = &body["metrics"][0];
        assert_eq!(metric["shannon_H"], Value::Null);
        assert_eq!(metric["dqi"], Value::Null);
        assert_eq!(metric["species_richness_cell"], json!(5));
    }
    assert!(func["response"]["functionResponse"].get("responseState").is_none());
}

#[tokio::test]
async fn test_session_attributes_are_echoed() {
    let router = router(CannedCatalog::default());

    let envelope = invoke(
        &router,
        json!({
            "apiPath": "/getNeighborHexes",
            "parameters": [{"name": "h3_id", "value": "8928308280fffff"}],
            "sessionAttributes": {"user": "ranger"},
        }),
    )
    .await;

    assert_eq!(envelope["sessionAttributes"], json!({"user": "ranger"}));
    assert_eq!(envelope["promptSessionAttributes"], json!({}));
}
