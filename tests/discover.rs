mod common;

use std::time::Duration;
use serde_json::json;
use compliance_engine::core::discovery::{discover_endpoints, render_endpoint_table, resolve_version};
use compliance_engine::core::http_client::build_client;
use compliance_engine::models::backend::BackendTarget;
use common::{MockBackend, Reply};

#[tokio::test]
async fn proposes_probes_from_capabilities() {
    let backend = MockBackend::start(|seen| match seen.url.as_str() {
        "/" => Reply::json(
            200,
            json!({
                "api_version": "1.0.0",
                "endpoints": [
                    {"path": "/", "methods": ["GET"]},
                    {"path": "/collections", "methods": ["GET"]},
                    {"path": "/collections/{collection_id}", "methods": ["GET"]},
                    {"path": "/jobs", "methods": ["GET", "POST"]}
                ]
            }),
        ),
        _ => Reply::status(404),
    });
    let client = build_client().unwrap();
    let target = BackendTarget::new(format!("{}/", backend.base_url));

    let proposed = discover_endpoints(&client, &target, &["GET".to_string(), "POST".to_string()], None)
        .await
        .unwrap();
    let ids: Vec<&str> = proposed.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["get_root", "get_collections", "get_jobs", "post_jobs"]);

    let rendered = render_endpoint_table(&proposed).unwrap();
    assert!(rendered.contains("[endpoints.post_jobs]"));
    assert!(rendered.contains("request_type = \"POST\""));
}

#[tokio::test]
async fn unreachable_well_known_keeps_base_url() {
    let backend = MockBackend::start(|_| Reply::status(500));
    let client = build_client().unwrap();
    let mut target = BackendTarget::new(backend.base_url.clone()).with_version("1.0.0");

    resolve_version(&client, &mut target, Some(Duration::from_secs(5))).await;

    assert_eq!(target.resolved_url, backend.base_url);
    assert_eq!(backend.requests_to("/.well-known/openeo").len(), 1);
}

#[tokio::test]
async fn capabilities_failure_is_a_discovery_error() {
    let backend = MockBackend::start(|_| Reply::status(503));
    let client = build_client().unwrap();
    let target = BackendTarget::new(backend.base_url.clone());

    let err = discover_endpoints(&client, &target, &["GET".to_string()], None)
        .await
        .unwrap_err();
    assert!(err.url.ends_with('/'));
    assert!(err.detail.contains("503"));
}
