use std::fs;
use std::path::Path;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use tracing::{debug, warn};
use crate::models::backend::BackendTarget;
use crate::models::endpoint::Endpoint;
use crate::models::error::ProbeError;
use crate::models::request::ProbeRequest;

/// Bearer credentials for a run. An empty token means anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BearerToken {
    pub token: String,
    /// Inserted between `Bearer ` and the token.
    pub prefix: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>, prefix: impl Into<String>) -> Self {
        BearerToken {
            token: token.into(),
            prefix: prefix.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }

    pub fn header_value(&self) -> Option<String> {
        if self.token.is_empty() {
            None
        } else {
            Some(format!("Bearer {}{}", self.prefix, self.token))
        }
    }
}

/// Exact, case-sensitive match; anything unrecognised is GET.
pub fn resolve_method(method: &str) -> Method {
    match method {
        "POST" => Method::POST,
        "PUT" => Method::PUT,
        "PATCH" => Method::PATCH,
        "DELETE" => Method::DELETE,
        _ => Method::GET,
    }
}

/// Turns a probe into a request.
///
/// With `absolute == false` the path is used verbatim, which is what route
/// lookup needs. With `absolute == true` the target base is prefixed.
/// A configured body file that does not exist fails before anything is sent.
pub fn build_request(
    endpoint: &Endpoint,
    target: &BackendTarget,
    token: &BearerToken,
    absolute: bool,
) -> Result<ProbeRequest, ProbeError> {
    let method = resolve_method(&endpoint.method);
    let url = if absolute {
        target.absolute(&endpoint.path)
    } else {
        endpoint.path.clone()
    };

    let mut headers = HeaderMap::new();
    if let Some(bearer) = token.header_value() {
        let value = HeaderValue::from_str(&bearer).map_err(|e| ProbeError::Configuration {
            input: endpoint.label(),
            detail: format!("token cannot be sent as a header: {e}"),
        })?;
        headers.insert(AUTHORIZATION, value);
    }

    let body = match endpoint.body_source.as_deref() {
        None | Some("") => None,
        Some(source) => {
            let bytes = read_body(endpoint, source)?;
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Some(bytes)
        }
    };

    debug!(id = %endpoint.id, %method, %url, has_body = body.is_some(), "built request");
    Ok(ProbeRequest {
        method,
        url,
        headers,
        body,
    })
}

fn read_body(endpoint: &Endpoint, source: &str) -> Result<Vec<u8>, ProbeError> {
    if !Path::new(source).is_file() {
        warn!(id = %endpoint.id, body = source, "body was set in config file, but the file does not exist");
        return Err(ProbeError::Configuration {
            input: endpoint.label(),
            detail: format!(
                "{}: Body was set in config file, but the file does not exist: {}",
                endpoint.path, source
            ),
        });
    }
    fs::read(source).map_err(|e| ProbeError::Configuration {
        input: endpoint.label(),
        detail: format!("{}: Body file could not be read: {}: {}", endpoint.path, source, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn target() -> BackendTarget {
        let mut target = BackendTarget::new("https://be.example");
        target.set_resolved("https://be.example/v1");
        target
    }

    #[test]
    fn method_matching_is_exact() {
        assert_eq!(resolve_method("POST"), Method::POST);
        assert_eq!(resolve_method("DELETE"), Method::DELETE);
        assert_eq!(resolve_method("post"), Method::GET);
        assert_eq!(resolve_method("OPTIONS"), Method::GET);
    }

    #[test]
    fn relative_and_absolute_addresses() {
        let ep = Endpoint::new("jobs", "GET", "/jobs");
        let rel = build_request(&ep, &target(), &BearerToken::default(), false).unwrap();
        assert_eq!(rel.url, "/jobs");
        let abs = build_request(&ep, &target(), &BearerToken::default(), true).unwrap();
        assert_eq!(abs.url, "https://be.example/v1/jobs");

        let wk = Endpoint::new("wk", "GET", "/.well-known/openeo");
        let abs = build_request(&wk, &target(), &BearerToken::default(), true).unwrap();
        assert_eq!(abs.url, "https://be.example/.well-known/openeo");
    }

    #[test]
    fn token_sets_bearer_header() {
        let ep = Endpoint::new("me", "GET", "/me");
        let anon = build_request(&ep, &target(), &BearerToken::default(), true).unwrap();
        assert!(!anon.has_authorization());

        let plain = build_request(&ep, &target(), &BearerToken::new("abc", ""), true).unwrap();
        assert_eq!(plain.headers[AUTHORIZATION], "Bearer abc");

        let legacy = build_request(&ep, &target(), &BearerToken::new("abc", "basic//"), false).unwrap();
        assert_eq!(legacy.headers[AUTHORIZATION], "Bearer basic//abc");
    }

    #[test]
    fn body_file_is_attached_as_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"title": "job"}"#).unwrap();
        let ep = Endpoint::new("create", "POST", "/jobs").with_body(file.path().to_string_lossy());
        let req = build_request(&ep, &target(), &BearerToken::default(), true).unwrap();
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.headers[CONTENT_TYPE], "application/json");
        assert_eq!(req.body.as_deref(), Some(br#"{"title": "job"}"#.as_slice()));
    }

    #[test]
    fn missing_body_file_is_a_configuration_error() {
        let ep = Endpoint::new("create", "POST", "/jobs").with_body("/no/such/body.json");
        let err = build_request(&ep, &target(), &BearerToken::default(), true).unwrap_err();
        match err {
            ProbeError::Configuration { detail, .. } => {
                assert!(detail.contains("/no/such/body.json"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_body_source_is_no_body() {
        let ep = Endpoint::new("create", "POST", "/jobs").with_body("");
        let req = build_request(&ep, &target(), &BearerToken::default(), true).unwrap();
        assert!(req.body.is_none());
        assert!(!req.headers.contains_key(CONTENT_TYPE));
    }
}
