use std::path::PathBuf;
use thiserror::Error;
use crate::models::verdict::{Diagnostic, Verdict};

/// Problems with the configuration as a whole. These stop the run before any
/// probe executes.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file could not be read: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file could not be parsed: {path}: {detail}")]
    Parse { path: PathBuf, detail: String },
    #[error("config include cycle detected at {0}")]
    IncludeCycle(PathBuf),
    #[error("endpoint {0} has no url")]
    MissingUrl(String),
    #[error("endpoint {0} has an empty id")]
    EmptyId(String),
    #[error("duplicate endpoint id: {0}")]
    DuplicateId(String),
    #[error("no back end url configured")]
    MissingBackendUrl,
    #[error("no openapi contract configured")]
    MissingContract,
}

/// Neither the local file nor the remote URI yielded a readable contract.
#[derive(Debug, Error)]
#[error("Error reading the API contract {source_ref}, neither file nor url found (file: {file_detail}; url: {uri_detail})")]
pub struct ContractUnavailable {
    pub source_ref: String,
    pub file_detail: String,
    pub uri_detail: String,
}

/// The credentials exchange failed. Reported at the end of the run, never fatal.
#[derive(Debug, Clone, Error)]
#[error("Error calling the authentication url {url}: {detail}")]
pub struct AuthenticationError {
    pub url: String,
    pub detail: String,
}

/// A discovery document could not be fetched or understood.
#[derive(Debug, Clone, Error)]
#[error("discovery request to {url} failed: {detail}")]
pub struct DiscoveryError {
    pub url: String,
    pub detail: String,
}

/// Failures raised by a [`ContractValidator`](crate::core::contract::ContractValidator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("no route declared for {method} {path}")]
    RouteNotFound { method: String, path: String },
    #[error("request invalid: {0}")]
    Request(String),
    #[error("response invalid: {0}")]
    Response(String),
    #[error("schema could not be compiled: {0}")]
    Schema(String),
}

/// Everything that can end a single probe early. Each variant carries the
/// offending input and the raw detail.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("Error processing the Config file")]
    Configuration { input: String, detail: String },
    #[error("Error finding endpoint in the OpenAPI definition")]
    RouteNotFound { input: String, detail: String },
    #[error("Error validating the request")]
    RequestSchemaViolation { input: String, detail: String },
    #[error("Error sending request to back end")]
    Transport { input: String, detail: String },
    #[error("Request to back end timed out")]
    Timeout { input: String, detail: String },
    #[error("Error: Authentication failed, the back end rejected the credentials")]
    AuthenticationRejected { input: String, detail: String },
    #[error("Endpoint was not found")]
    NotFound { input: String, detail: String },
    #[error("A client or server error occurred")]
    HttpStatus { input: String, detail: String },
    #[error("Error reading response from the back end")]
    ResponseRead { input: String, detail: String },
    #[error("Response of the back end not valid")]
    ResponseSchemaViolation { input: String, detail: String },
}

impl ProbeError {
    fn parts(&self) -> (&str, &str) {
        match self {
            ProbeError::Configuration { input, detail }
            | ProbeError::RouteNotFound { input, detail }
            | ProbeError::RequestSchemaViolation { input, detail }
            | ProbeError::Transport { input, detail }
            | ProbeError::Timeout { input, detail }
            | ProbeError::AuthenticationRejected { input, detail }
            | ProbeError::NotFound { input, detail }
            | ProbeError::HttpStatus { input, detail }
            | ProbeError::ResponseRead { input, detail }
            | ProbeError::ResponseSchemaViolation { input, detail } => (input, detail),
        }
    }

    pub fn diagnostic(&self) -> Diagnostic {
        let (input, detail) = self.parts();
        Diagnostic::new(input, self.to_string(), detail)
    }

    /// Maps the failure category onto the verdict it produces.
    pub fn into_verdict(self) -> Verdict {
        let diagnostic = self.diagnostic();
        match self {
            ProbeError::NotFound { .. } => Verdict::Missing(diagnostic),
            ProbeError::Transport { .. }
            | ProbeError::Timeout { .. }
            | ProbeError::HttpStatus { .. } => Verdict::Error(diagnostic),
            ProbeError::Configuration { .. }
            | ProbeError::RouteNotFound { .. }
            | ProbeError::RequestSchemaViolation { .. }
            | ProbeError::AuthenticationRejected { .. }
            | ProbeError::ResponseRead { .. }
            | ProbeError::ResponseSchemaViolation { .. } => Verdict::Invalid(diagnostic),
        }
    }
}
