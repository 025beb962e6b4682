use std::path::Path;
use std::time::Duration;
use reqwest::Client;
use thiserror::Error;
use tracing::{error, info, warn};
use crate::core::authenticate::{authenticate, Credentials};
use crate::core::config_loader::load_settings;
use crate::core::contract::{load_contract, ContractValidator};
use crate::core::discovery::resolve_version;
use crate::core::http_client::build_client;
use crate::core::probe::{execute_probe, ProbeContext};
use crate::core::request_builder::BearerToken;
use crate::core::substitute::substitute_endpoint;
use crate::models::config::Settings;
use crate::models::endpoint::Endpoint;
use crate::models::error::{ConfigError, ContractUnavailable};
use crate::models::report::{ProbeRecord, Report, RunOutcome};
use crate::models::variable_store::VariableStore;

/// Failures that stop a run before any probe executes.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Contract(#[from] ContractUnavailable),
    #[error("http client could not be built: {0}")]
    Client(#[from] reqwest::Error),
}

/// Orders probes for execution: groups by first appearance, then declared
/// position inside each group, stably re-sorted by `order` where given.
///
/// Group names are resolved against `variables` here, once, and stay fixed
/// for the rest of the run. Probes that reference ids created by other
/// probes depend on this order.
pub fn execution_order(endpoints: &[Endpoint], variables: &VariableStore) -> Vec<Endpoint> {
    let mut groups: Vec<(String, Vec<Endpoint>)> = Vec::new();
    for endpoint in endpoints {
        let group = variables.substitute(&endpoint.group);
        let endpoint = Endpoint {
            group: group.clone(),
            ..endpoint.clone()
        };
        match groups.iter_mut().find(|(name, _)| *name == group) {
            Some((_, members)) => members.push(endpoint),
            None => groups.push((group, vec![endpoint])),
        }
    }
    groups
        .into_iter()
        .flat_map(|(_, mut members)| {
            // unordered probes keep their relative position after the ordered ones
            members.sort_by_key(|e| (e.order.is_none(), e.order));
            members
        })
        .collect()
}

/// Runs every probe of `settings` against `contract`, one after another.
///
/// Authentication happens once up front; its failure does not stop the run
/// but is handed back in the outcome. Variables written by a probe are
/// visible to every later one.
pub async fn run(settings: &Settings, contract: &dyn ContractValidator, client: &Client) -> RunOutcome {
    let default_timeout = settings.default_timeout.map(Duration::from_secs);
    let mut target = settings.target.clone();
    resolve_version(client, &mut target, default_timeout).await;

    let credentials = Credentials {
        auth_path: settings.auth_path.as_deref(),
        username: settings.username.as_deref(),
        password: settings.password.as_deref(),
    };
    let (token, auth_error) = match authenticate(client, &target, credentials, default_timeout).await {
        Ok(token) => (token, None),
        Err(e) => {
            warn!("continuing without a token: {e}");
            (String::new(), Some(e))
        }
    };
    let token = BearerToken::new(token, settings.token_prefix.clone());

    let ctx = ProbeContext {
        client,
        target: &target,
        token: &token,
        auth_path: settings.auth_path.as_deref(),
        default_timeout,
    };
    let mut variables = settings.variables.clone();
    let mut report = Report::default();

    for declared in execution_order(&settings.endpoints, &settings.variables) {
        let endpoint = Endpoint {
            group: declared.group.clone(),
            ..substitute_endpoint(&declared, &variables)
        };
        let verdict = execute_probe(&ctx, contract, &endpoint, &mut variables).await;
        info!(
            group = %endpoint.group,
            id = %endpoint.id,
            method = %endpoint.method,
            url = %endpoint.path,
            state = %verdict.state(),
            "{}",
            verdict.message()
        );
        report.record(ProbeRecord {
            id: endpoint.id,
            group: endpoint.group,
            path: endpoint.path,
            method: endpoint.method,
            verdict,
        });
    }

    if let Some(e) = &auth_error {
        error!(url = %e.url, "authentication failed, all probes ran anonymously: {}", e.detail);
    }
    RunOutcome { report, auth_error }
}

/// Loads configuration and contract, then runs. Only setup problems are
/// errors; probe failures live in the report.
pub async fn run_from_config(path: &Path) -> Result<(Settings, RunOutcome), SetupError> {
    let settings = load_settings(path)?;
    let client = build_client()?;
    let contract = load_contract(&settings.contract_source, &client).await?;
    if let (Some(title), Some(version)) = (contract.title(), contract.version()) {
        info!(title, version, "validating against contract");
    }
    let outcome = run(&settings, &contract, &client).await;
    Ok((settings, outcome))
}
