use std::time::Duration;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use crate::models::backend::BackendTarget;
use crate::models::config::{ConfigFile, EndpointConfig, EndpointTable};
use crate::models::endpoint::Endpoint;
use crate::models::error::DiscoveryError;

/// Well-known document listing the versions a back end serves.
pub const WELL_KNOWN_PATH: &str = "/.well-known/openeo";

#[derive(Debug, Deserialize)]
struct WellKnown {
    #[serde(default)]
    versions: Vec<AdvertisedVersion>,
}

#[derive(Debug, Deserialize)]
struct AdvertisedVersion {
    api_version: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Capabilities {
    #[serde(default)]
    endpoints: Vec<CapabilityEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CapabilityEndpoint {
    path: Option<String>,
    #[serde(default)]
    methods: Vec<String>,
}

async fn get_json(client: &Client, url: &str, timeout: Option<Duration>) -> Result<Value, DiscoveryError> {
    let mut request = client.get(url);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }
    let fail = |detail: String| DiscoveryError {
        url: url.to_string(),
        detail,
    };
    let response = request.send().await.map_err(|e| fail(e.to_string()))?;
    let response = response.error_for_status().map_err(|e| fail(e.to_string()))?;
    response.json::<Value>().await.map_err(|e| fail(e.to_string()))
}

/// Picks the advertised base for the declared version.
///
/// Without a declared version nothing is fetched. Any failure, or no
/// matching entry, leaves `resolved_url` at the unversioned base.
pub async fn resolve_version(client: &Client, target: &mut BackendTarget, timeout: Option<Duration>) {
    let Some(version) = target.declared_version.clone() else {
        return;
    };
    let url = format!("{}{}", target.base_url, WELL_KNOWN_PATH);
    let document = match get_json(client, &url, timeout).await {
        Ok(document) => document,
        Err(e) => {
            warn!(%version, "version discovery failed, using base url: {e}");
            return;
        }
    };
    let versions = match serde_json::from_value::<WellKnown>(document) {
        Ok(well_known) => well_known.versions,
        Err(e) => {
            warn!(%url, "well-known document not understood, using base url: {e}");
            return;
        }
    };
    let found = versions
        .into_iter()
        .find(|v| v.api_version.as_deref() == Some(version.as_str()))
        .and_then(|v| v.url);
    match found {
        Some(versioned) => {
            info!(%version, url = %versioned, "resolved version-specific base");
            target.set_resolved(versioned);
        }
        None => warn!(%version, "declared version not advertised, using base url"),
    }
}

/// Proposes one probe per advertised path and requested method.
///
/// Templated paths are skipped since they need values nobody has yet.
pub async fn discover_endpoints(
    client: &Client,
    target: &BackendTarget,
    methods: &[String],
    timeout: Option<Duration>,
) -> Result<Vec<Endpoint>, DiscoveryError> {
    let url = format!("{}/", target.resolved_url);
    let document = get_json(client, &url, timeout).await?;
    let capabilities: Capabilities = serde_json::from_value(document).map_err(|e| DiscoveryError {
        url: url.clone(),
        detail: e.to_string(),
    })?;
    Ok(propose(&capabilities, methods))
}

fn propose(capabilities: &Capabilities, methods: &[String]) -> Vec<Endpoint> {
    let mut proposed = Vec::new();
    for advertised in &capabilities.endpoints {
        let Some(path) = advertised.path.as_deref() else {
            continue;
        };
        if path.contains('{') {
            continue;
        }
        for method in &advertised.methods {
            if !methods.iter().any(|m| m.eq_ignore_ascii_case(method)) {
                continue;
            }
            let method = method.to_uppercase();
            let id = probe_id(&method, path);
            if proposed.iter().any(|e: &Endpoint| e.id == id) {
                continue;
            }
            proposed.push(Endpoint::new(id, method, path));
        }
    }
    proposed
}

// "GET /collections" -> "get_collections", "/" -> "get_root"
fn probe_id(method: &str, path: &str) -> String {
    let slug: String = path
        .trim_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = if slug.is_empty() { "root".to_string() } else { slug };
    format!("{}_{}", method.to_lowercase(), slug)
}

/// Renders proposed probes as an `[endpoints]` table.
pub fn to_endpoint_table(endpoints: &[Endpoint]) -> EndpointTable {
    let mut table = EndpointTable::default();
    for endpoint in endpoints {
        table.insert(
            endpoint.id.clone(),
            EndpointConfig {
                url: Some(endpoint.path.clone()),
                request_type: Some(endpoint.method.clone()),
                ..EndpointConfig::default()
            },
        );
    }
    table
}

/// TOML fragment with one `[endpoints.<id>]` table per proposed probe.
pub fn render_endpoint_table(endpoints: &[Endpoint]) -> Result<String, toml::ser::Error> {
    toml::to_string(&ConfigFile {
        endpoints: to_endpoint_table(endpoints),
        ..ConfigFile::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn proposes_untemplated_paths_for_requested_methods() {
        let capabilities: Capabilities = serde_json::from_value(json!({
            "endpoints": [
                {"path": "/", "methods": ["GET"]},
                {"path": "/collections", "methods": ["GET"]},
                {"path": "/collections/{collection_id}", "methods": ["GET"]},
                {"path": "/jobs", "methods": ["GET", "POST"]}
            ]
        }))
        .unwrap();
        let proposed = propose(&capabilities, &["GET".to_string()]);
        let ids: Vec<&str> = proposed.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["get_root", "get_collections", "get_jobs"]);

        let proposed = propose(&capabilities, &["post".to_string()]);
        assert_eq!(proposed.len(), 1);
        assert_eq!(proposed[0].method, "POST");
        assert_eq!(proposed[0].path, "/jobs");
    }

    #[test]
    fn endpoint_table_renders_as_toml() {
        let rendered = render_endpoint_table(&[Endpoint::new("get_jobs", "GET", "/jobs")]).unwrap();
        assert!(rendered.contains("[endpoints.get_jobs]"));
        assert!(rendered.contains("url = \"/jobs\""));
        assert!(rendered.contains("request_type = \"GET\""));
    }
}
