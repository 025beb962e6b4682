use std::time::Duration;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{info, warn};
use crate::models::backend::BackendTarget;
use crate::models::error::AuthenticationError;

/// Login material for the resource-owner-password-credentials exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    pub auth_path: Option<&'a str>,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
}

impl Credentials<'_> {
    fn is_complete(&self) -> bool {
        [self.auth_path, self.username, self.password]
            .iter()
            .all(|part| part.is_some_and(|s| !s.is_empty()))
    }
}

/// Exchanges credentials for a bearer token.
///
/// Returns an empty token without touching the network when any part of the
/// credentials is unset. A 200 whose JSON lacks `access_token` also yields an
/// empty token. Other statuses and transport failures are errors the caller
/// reports at the end of the run.
pub async fn authenticate(
    client: &Client,
    target: &BackendTarget,
    credentials: Credentials<'_>,
    timeout: Option<Duration>,
) -> Result<String, AuthenticationError> {
    if !credentials.is_complete() {
        info!("no credentials configured, running anonymously");
        return Ok(String::new());
    }
    let auth_path = credentials.auth_path.unwrap_or_default();
    let url = format!("{}{}", target.resolved_url, auth_path);

    let mut request = client
        .get(&url)
        .basic_auth(credentials.username.unwrap_or_default(), credentials.password);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await.map_err(|e| {
        warn!(%url, "authentication request failed: {e}");
        AuthenticationError {
            url: url.clone(),
            detail: e.to_string(),
        }
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| AuthenticationError {
        url: url.clone(),
        detail: e.to_string(),
    })?;
    if status != StatusCode::OK {
        warn!(%url, %status, "authentication rejected");
        return Err(AuthenticationError {
            url,
            detail: format!("Response Code {}: {}", status.as_u16(), body),
        });
    }

    let token = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|json| json.get("access_token").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default();
    if token.is_empty() {
        warn!(%url, "authentication succeeded without an access_token");
    } else {
        info!(%url, "authenticated");
    }
    Ok(token)
}
