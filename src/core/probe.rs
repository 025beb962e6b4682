use std::time::Duration;
use jsonpath_lib::select;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use crate::core::contract::{AuthenticationInput, ContractValidator, Route};
use crate::core::request_builder::{build_request, BearerToken};
use crate::models::backend::BackendTarget;
use crate::models::endpoint::Endpoint;
use crate::models::error::ProbeError;
use crate::models::request::ProbeRequest;
use crate::models::variable_store::VariableStore;
use crate::models::verdict::Verdict;

/// Response headers that may carry the id of a created resource, in order.
pub const IDENTIFIER_HEADERS: [&str; 2] = ["Resource-Identifier", "OpenEO-Identifier"];

/// A call that creates a resource and the variable its id is published under.
#[derive(Debug, Clone, Copy)]
pub struct CreationRule {
    pub method: &'static str,
    pub path: &'static str,
    pub variable: &'static str,
}

pub const CREATION_RULES: [CreationRule; 2] = [
    CreationRule { method: "POST", path: "/jobs", variable: "job_id" },
    CreationRule { method: "POST", path: "/services", variable: "service_id" },
];

/// Steps a probe walks through. Any of them may end it early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Built,
    RouteMatched,
    RequestValidated,
    Sent,
    ResponseReceived,
    ResponseValidated,
    Classified,
}

/// Run-wide inputs a probe reads but never changes.
#[derive(Debug, Clone, Copy)]
pub struct ProbeContext<'a> {
    pub client: &'a Client,
    pub target: &'a BackendTarget,
    pub token: &'a BearerToken,
    /// Path whose probe only checks that the session is valid.
    pub auth_path: Option<&'a str>,
    pub default_timeout: Option<Duration>,
}

/// What a successful exchange leaves behind for variable extraction.
struct Exchange {
    headers: HeaderMap,
    body: Vec<u8>,
}

/// Accepts requests against undeclared schemes, and anything already
/// carrying an `Authorization` header. Whether the token is good is the back
/// end's call.
pub fn authorization_present(input: &AuthenticationInput<'_>) -> bool {
    let accepted = input.scheme_type.is_empty() || input.request.has_authorization();
    if !accepted {
        debug!(scheme = input.scheme_name, "secured route requested without an Authorization header");
    }
    accepted
}

/// Drives one probe to its final verdict and publishes response-derived
/// variables on success. Optional probes never come back failed.
pub async fn execute_probe(
    ctx: &ProbeContext<'_>,
    contract: &dyn ContractValidator,
    endpoint: &Endpoint,
    variables: &mut VariableStore,
) -> Verdict {
    if is_session_check(ctx, endpoint) {
        debug!(id = %endpoint.id, "session check satisfied by the existing token");
        return Verdict::Valid(None);
    }
    let verdict = match run_probe(ctx, contract, endpoint).await {
        Ok(exchange) => {
            publish_variables(endpoint, &exchange, variables);
            Verdict::Valid(None)
        }
        Err(e) => e.into_verdict(),
    };
    debug!(id = %endpoint.id, stage = ?Stage::Classified, state = %verdict.state());
    verdict.apply_optionality(endpoint.optional)
}

fn is_session_check(ctx: &ProbeContext<'_>, endpoint: &Endpoint) -> bool {
    !ctx.token.is_empty() && ctx.auth_path.is_some_and(|p| !p.is_empty() && p == endpoint.path)
}

async fn run_probe(
    ctx: &ProbeContext<'_>,
    contract: &dyn ContractValidator,
    endpoint: &Endpoint,
) -> Result<Exchange, ProbeError> {
    let relative = build_request(endpoint, ctx.target, ctx.token, false)?;
    debug!(id = %endpoint.id, stage = ?Stage::Built);
    let input = format!("{}  {}", relative.method, endpoint.path);

    let (route, path_params) = contract
        .match_route(&relative.method, &relative.url)
        .map_err(|e| ProbeError::RouteNotFound {
            input: input.clone(),
            detail: e.to_string(),
        })?;
    debug!(
        id = %endpoint.id,
        stage = ?Stage::RouteMatched,
        template = %route.path_template,
        operation = route.operation_id().unwrap_or("-"),
    );

    contract
        .validate_request(&route, &path_params, &relative, &authorization_present)
        .map_err(|e| ProbeError::RequestSchemaViolation {
            input: input.clone(),
            detail: e.to_string(),
        })?;
    debug!(id = %endpoint.id, stage = ?Stage::RequestValidated);

    let absolute = build_request(endpoint, ctx.target, ctx.token, true)?;
    let timeout = endpoint.timeout_secs.map(Duration::from_secs).or(ctx.default_timeout);
    send_and_validate(ctx, contract, endpoint, &route, absolute, timeout, input).await
}

async fn send_and_validate(
    ctx: &ProbeContext<'_>,
    contract: &dyn ContractValidator,
    endpoint: &Endpoint,
    route: &Route,
    request: ProbeRequest,
    timeout: Option<Duration>,
    input: String,
) -> Result<Exchange, ProbeError> {
    let had_authorization = request.has_authorization();
    let mut outgoing = ctx.client.request(request.method, &request.url).headers(request.headers);
    if let Some(body) = request.body {
        outgoing = outgoing.body(body);
    }
    if let Some(timeout) = timeout {
        outgoing = outgoing.timeout(timeout);
    }

    let response = outgoing.send().await.map_err(|e| {
        if e.is_timeout() {
            ProbeError::Timeout {
                input: input.clone(),
                detail: e.to_string(),
            }
        } else {
            ProbeError::Transport {
                input: input.clone(),
                detail: e.to_string(),
            }
        }
    })?;
    let status = response.status();
    debug!(id = %endpoint.id, stage = ?Stage::Sent, %status);

    if status == StatusCode::UNAUTHORIZED {
        let detail = response.text().await.unwrap_or_default();
        let presented = if had_authorization { "Bearer token sent" } else { "none" };
        return Err(ProbeError::AuthenticationRejected {
            input: format!("Header Auth: {presented}"),
            detail,
        });
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ProbeError::NotFound {
            input: endpoint.path.clone(),
            detail: format!("Response Code {}", status.as_u16()),
        });
    }
    if status.is_client_error() || status.is_server_error() {
        return Err(ProbeError::HttpStatus {
            input: endpoint.path.clone(),
            detail: format!("Response Code {}", status.as_u16()),
        });
    }

    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            ProbeError::Timeout {
                input: input.clone(),
                detail: e.to_string(),
            }
        } else {
            ProbeError::ResponseRead {
                input: input.clone(),
                detail: e.to_string(),
            }
        }
    })?;
    debug!(id = %endpoint.id, stage = ?Stage::ResponseReceived, bytes = body.len());

    contract
        .validate_response(route, status.as_u16(), &headers, &body)
        .map_err(|e| ProbeError::ResponseSchemaViolation {
            input,
            detail: e.to_string(),
        })?;
    debug!(id = %endpoint.id, stage = ?Stage::ResponseValidated);

    Ok(Exchange {
        headers,
        body: body.to_vec(),
    })
}

fn normalized_path(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or_default();
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// The creation rule a probe falls under, if any.
pub fn creation_rule(endpoint: &Endpoint) -> Option<&'static CreationRule> {
    let path = normalized_path(&endpoint.path);
    CREATION_RULES
        .iter()
        .find(|rule| rule.method == endpoint.method && rule.path == path)
}

/// Id of a created resource: identifier headers first, then the last
/// segment of `Location`.
pub fn created_identifier(headers: &HeaderMap) -> Option<String> {
    let from_header = IDENTIFIER_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(id) = from_header {
        return Some(id.to_string());
    }
    headers
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|location| location.trim_end_matches('/').rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn publish_variables(endpoint: &Endpoint, exchange: &Exchange, variables: &mut VariableStore) {
    if let Some(rule) = creation_rule(endpoint) {
        match created_identifier(&exchange.headers) {
            Some(id) => {
                info!(id = %endpoint.id, variable = rule.variable, value = %id, "published created resource");
                variables.insert(rule.variable, id);
            }
            None => warn!(id = %endpoint.id, "creation call returned no resource identifier"),
        }
    }
    if endpoint.extract.is_empty() {
        return;
    }
    let json: Value = match serde_json::from_slice(&exchange.body) {
        Ok(json) => json,
        Err(e) => {
            warn!(id = %endpoint.id, "response is not JSON, nothing extracted: {e}");
            return;
        }
    };
    for extract in &endpoint.extract {
        match select(&json, &extract.jsonpath) {
            Ok(found) => match found.first() {
                Some(Value::String(s)) => variables.insert(extract.key.clone(), s.clone()),
                Some(other) => variables.insert(extract.key.clone(), other.to_string()),
                None => warn!(id = %endpoint.id, jsonpath = %extract.jsonpath, "no match in response"),
            },
            Err(e) => warn!(id = %endpoint.id, jsonpath = %extract.jsonpath, "JSONPath query failed: {e}"),
        }
    }
}
