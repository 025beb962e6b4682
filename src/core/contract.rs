use std::collections::HashMap;
use std::fs;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use tracing::{debug, info};
use crate::core::schema;
use crate::models::error::{ContractError, ContractUnavailable};
use crate::models::request::ProbeRequest;

pub type PathParams = HashMap<String, String>;

/// A declared operation a request resolved to.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub path_template: String,
    path_item: Value,
    operation: Value,
}

impl Route {
    pub fn operation_id(&self) -> Option<&str> {
        self.operation.get("operationId").and_then(Value::as_str)
    }
}

/// What an authentication predicate gets to see for one security scheme.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticationInput<'a> {
    pub scheme_name: &'a str,
    /// `http`, `apiKey`, `oauth2`, `openIdConnect`, or empty when undeclared.
    pub scheme_type: &'a str,
    pub request: &'a ProbeRequest,
}

/// The seam between the engine and whatever understands the contract.
pub trait ContractValidator {
    fn match_route(&self, method: &Method, url: &str) -> Result<(Route, PathParams), ContractError>;

    fn validate_request(
        &self,
        route: &Route,
        path_params: &PathParams,
        request: &ProbeRequest,
        authenticate: &dyn Fn(&AuthenticationInput<'_>) -> bool,
    ) -> Result<(), ContractError>;

    fn validate_response(
        &self,
        route: &Route,
        status: u16,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), ContractError>;
}

/// An OpenAPI 3 document held as JSON.
#[derive(Debug, Clone)]
pub struct OpenApiContract {
    document: Value,
    base_paths: Vec<String>,
}

/// Loads the contract from a local file, falling back to a remote URI.
pub async fn load_contract(source: &str, client: &Client) -> Result<OpenApiContract, ContractUnavailable> {
    let file_detail = match fs::read_to_string(source) {
        Ok(text) => match OpenApiContract::parse(&text) {
            Ok(contract) => {
                info!(source, "loaded contract from file");
                return Ok(contract);
            }
            Err(e) => e,
        },
        Err(e) => e.to_string(),
    };

    let uri_detail = if source.starts_with("http://") || source.starts_with("https://") {
        match fetch(source, client).await {
            Ok(text) => match OpenApiContract::parse(&text) {
                Ok(contract) => {
                    info!(source, "loaded contract from url");
                    return Ok(contract);
                }
                Err(e) => e,
            },
            Err(e) => e,
        }
    } else {
        "not an http(s) url".to_string()
    };

    Err(ContractUnavailable {
        source_ref: source.to_string(),
        file_detail,
        uri_detail,
    })
}

async fn fetch(url: &str, client: &Client) -> Result<String, String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    let response = response.error_for_status().map_err(|e| e.to_string())?;
    response.text().await.map_err(|e| e.to_string())
}

impl OpenApiContract {
    /// Parses JSON, or YAML when the text is not JSON.
    pub fn parse(text: &str) -> Result<OpenApiContract, String> {
        let document: Value = match serde_json::from_str(text) {
            Ok(document) => document,
            Err(json_err) => serde_yaml::from_str(text)
                .map_err(|yaml_err| format!("neither JSON ({json_err}) nor YAML ({yaml_err})"))?,
        };
        OpenApiContract::from_document(document)
    }

    pub fn from_document(document: Value) -> Result<OpenApiContract, String> {
        if !document.get("paths").is_some_and(Value::is_object) {
            return Err("document declares no paths".to_string());
        }
        let base_paths = server_base_paths(&document);
        Ok(OpenApiContract { document, base_paths })
    }

    pub fn title(&self) -> Option<&str> {
        self.document.pointer("/info/title").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.document.pointer("/info/version").and_then(Value::as_str)
    }

    fn paths(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.document
            .get("paths")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|paths| paths.iter())
    }

    fn resolve(&self, value: &Value) -> Value {
        schema::inline_refs(&self.document, value)
    }

    fn parameters(&self, route: &Route) -> Vec<Value> {
        let mut params: Vec<Value> = Vec::new();
        let declared = [&route.path_item, &route.operation];
        for owner in declared {
            let Some(list) = owner.get("parameters").and_then(Value::as_array) else {
                continue;
            };
            for param in list {
                let param = self.resolve(param);
                let key = |p: &Value| (p.get("name").cloned(), p.get("in").cloned());
                // operation-level parameters replace path-level ones
                params.retain(|existing| key(existing) != key(&param));
                params.push(param);
            }
        }
        params
    }

    fn check_parameters(&self, route: &Route, path_params: &PathParams, request: &ProbeRequest) -> Result<(), String> {
        let query = request.query_pairs();
        for param in self.parameters(route) {
            let name = param.get("name").and_then(Value::as_str).unwrap_or_default();
            let location = param.get("in").and_then(Value::as_str).unwrap_or_default();
            let required = param.get("required").and_then(Value::as_bool).unwrap_or(location == "path");
            let value: Option<String> = match location {
                "path" => path_params.get(name).cloned(),
                "query" => query.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone()),
                "header" => request
                    .headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                _ => continue,
            };
            let Some(value) = value else {
                if required {
                    return Err(format!("parameter '{name}' in {location} is required"));
                }
                continue;
            };
            if let Some(param_schema) = param.get("schema") {
                let instance = coerce_parameter(&value, param_schema);
                schema::validate(param_schema, &instance)
                    .map_err(|e| format!("parameter '{name}' in {location}: {e}"))?;
            }
        }
        Ok(())
    }

    fn check_body(&self, route: &Route, request: &ProbeRequest) -> Result<(), String> {
        let Some(request_body) = route.operation.get("requestBody").map(|b| self.resolve(b)) else {
            return Ok(());
        };
        let required = request_body.get("required").and_then(Value::as_bool).unwrap_or(false);
        let Some(body) = request.body.as_deref().filter(|b| !b.is_empty()) else {
            if required {
                return Err("request body has not been specified".to_string());
            }
            return Ok(());
        };
        let content_type = request
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json");
        let Some(content) = request_body.get("content").and_then(Value::as_object) else {
            return Ok(());
        };
        let Some((media, declared)) = find_media(content, content_type) else {
            return Err(format!("request body has an unsupported content type '{content_type}'"));
        };
        check_json_payload(media, declared, body)
    }

    fn check_security(
        &self,
        route: &Route,
        request: &ProbeRequest,
        authenticate: &dyn Fn(&AuthenticationInput<'_>) -> bool,
    ) -> Result<(), String> {
        let requirements = route
            .operation
            .get("security")
            .or_else(|| self.document.get("security"))
            .and_then(Value::as_array);
        let Some(requirements) = requirements.filter(|r| !r.is_empty()) else {
            return Ok(());
        };
        let schemes = self.document.pointer("/components/securitySchemes");
        let mut failed = Vec::new();
        for requirement in requirements {
            let Some(names) = requirement.as_object() else {
                continue;
            };
            let satisfied = names.keys().all(|name| {
                let declared = schemes.and_then(|s| s.get(name));
                let input = AuthenticationInput {
                    scheme_name: name,
                    scheme_type: declared.and_then(|d| d.get("type")).and_then(Value::as_str).unwrap_or_default(),
                    request,
                };
                authenticate(&input)
            });
            if satisfied {
                return Ok(());
            }
            failed.push(names.keys().cloned().collect::<Vec<_>>().join("+"));
        }
        Err(format!("security requirements failed: {}", failed.join(", ")))
    }
}

impl ContractValidator for OpenApiContract {
    fn match_route(&self, method: &Method, url: &str) -> Result<(Route, PathParams), ContractError> {
        let not_found = || ContractError::RouteNotFound {
            method: method.to_string(),
            path: url.to_string(),
        };
        let probe = ProbeRequest {
            method: method.clone(),
            url: url.to_string(),
            headers: HeaderMap::new(),
            body: None,
        };
        let path = probe.path();
        let mut candidates = vec![path.clone()];
        for base in &self.base_paths {
            if let Some(rest) = path.strip_prefix(base.as_str()) {
                if rest.is_empty() || rest.starts_with('/') {
                    candidates.push(if rest.is_empty() { "/".to_string() } else { rest.to_string() });
                }
            }
        }

        let verb = method.as_str().to_ascii_lowercase();
        let mut best: Option<(usize, &String, &Value, PathParams)> = None;
        for candidate in &candidates {
            for (template, item) in self.paths() {
                let Some((literals, params)) = match_template(template, candidate) else {
                    continue;
                };
                if item.get(&verb).is_none() {
                    continue;
                }
                if best.as_ref().map_or(true, |(score, ..)| literals > *score) {
                    best = Some((literals, template, item, params));
                }
            }
        }
        let (_, template, item, params) = best.ok_or_else(not_found)?;
        let operation = item.get(&verb).cloned().ok_or_else(not_found)?;
        debug!(%method, path, template = %template, "route matched");
        Ok((
            Route {
                method: method.clone(),
                path_template: template.clone(),
                path_item: item.clone(),
                operation,
            },
            params,
        ))
    }

    fn validate_request(
        &self,
        route: &Route,
        path_params: &PathParams,
        request: &ProbeRequest,
        authenticate: &dyn Fn(&AuthenticationInput<'_>) -> bool,
    ) -> Result<(), ContractError> {
        self.check_security(route, request, authenticate)
            .and_then(|_| self.check_parameters(route, path_params, request))
            .and_then(|_| self.check_body(route, request))
            .map_err(ContractError::Request)
    }

    fn validate_response(
        &self,
        route: &Route,
        status: u16,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), ContractError> {
        let responses = route.operation.get("responses").and_then(Value::as_object);
        let declared = responses.and_then(|r| {
            let exact = status.to_string();
            let range = format!("{}XX", status / 100);
            r.get(&exact)
                .or_else(|| r.get(&range))
                .or_else(|| r.get(&range.to_lowercase()))
                .or_else(|| r.get("default"))
        });
        let Some(declared) = declared.map(|d| self.resolve(d)) else {
            return Err(ContractError::Response(format!("status code {status} is not declared")));
        };

        if let Some(declared_headers) = declared.get("headers").and_then(Value::as_object) {
            for (name, header) in declared_headers {
                let required = header.get("required").and_then(Value::as_bool).unwrap_or(false);
                if required && !headers.contains_key(name.as_str()) {
                    return Err(ContractError::Response(format!("required header '{name}' is missing")));
                }
            }
        }

        if body.is_empty() {
            return Ok(());
        }
        let Some(content) = declared.get("content").and_then(Value::as_object).filter(|c| !c.is_empty()) else {
            return Ok(());
        };
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json");
        let Some((media, media_declared)) = find_media(content, content_type) else {
            return Err(ContractError::Response(format!(
                "response content type '{content_type}' is not declared"
            )));
        };
        check_json_payload(media, media_declared, body).map_err(ContractError::Response)
    }
}

fn check_json_payload(media: &str, declared: &Value, body: &[u8]) -> Result<(), String> {
    if !media.contains("json") && media != "*/*" {
        return Ok(());
    }
    let Some(body_schema) = declared.get("schema") else {
        return Ok(());
    };
    let instance: Value = serde_json::from_slice(body).map_err(|e| format!("body is not valid JSON: {e}"))?;
    schema::validate(body_schema, &instance)
}

// Exact media type first, then `type/*`, then `*/*`.
fn find_media<'a>(content: &'a Map<String, Value>, content_type: &str) -> Option<(&'a str, &'a Value)> {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let wildcard = essence.split('/').next().map(|major| format!("{major}/*"));
    let lookup = |key: &str| {
        content
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(k, v)| (k.as_str(), v))
    };
    lookup(&essence)
        .or_else(|| wildcard.as_deref().and_then(lookup))
        .or_else(|| lookup("*/*"))
}

fn coerce_parameter(raw: &str, param_schema: &Value) -> Value {
    match param_schema.get("type").and_then(Value::as_str) {
        Some("integer") => raw.parse::<i64>().map(Value::from).unwrap_or_else(|_| Value::from(raw)),
        Some("number") => raw.parse::<f64>().map(Value::from).unwrap_or_else(|_| Value::from(raw)),
        Some("boolean") => raw.parse::<bool>().map(Value::from).unwrap_or_else(|_| Value::from(raw)),
        _ => Value::from(raw),
    }
}

/// Matches `/jobs/{job_id}` against `/jobs/j-1`. Returns the number of
/// literal segments (for ranking) and the captured parameters.
fn match_template(template: &str, path: &str) -> Option<(usize, PathParams)> {
    let template_segments: Vec<&str> = trim_trailing(template).split('/').collect();
    let path_segments: Vec<&str> = trim_trailing(path).split('/').collect();
    if template_segments.len() != path_segments.len() {
        return None;
    }
    let mut literals = 0;
    let mut params = PathParams::new();
    for (expected, actual) in template_segments.iter().zip(&path_segments) {
        match expected.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => {
                if actual.is_empty() {
                    return None;
                }
                params.insert(name.to_string(), actual.to_string());
            }
            None if expected == actual => literals += 1,
            None => return None,
        }
    }
    Some((literals, params))
}

fn trim_trailing(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

// Path part of every `servers[].url`, with server variables at their defaults.
fn server_base_paths(document: &Value) -> Vec<String> {
    let Some(servers) = document.get("servers").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut bases = Vec::new();
    for server in servers {
        let Some(url) = server.get("url").and_then(Value::as_str) else {
            continue;
        };
        let mut url = url.to_string();
        if let Some(variables) = server.get("variables").and_then(Value::as_object) {
            for (name, variable) in variables {
                if let Some(default) = variable.get("default").and_then(Value::as_str) {
                    url = url.replace(&format!("{{{name}}}"), default);
                }
            }
        }
        let probe = ProbeRequest {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
        };
        let path = probe.path();
        let base = trim_trailing(&path).to_string();
        if base != "/" && !base.is_empty() && !bases.contains(&base) {
            bases.push(base);
        }
    }
    bases
}
