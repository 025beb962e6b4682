use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use compliance_engine::core::config_loader::{load_config_file, resolve_env};
use compliance_engine::core::discovery::{discover_endpoints, render_endpoint_table, resolve_version};
use compliance_engine::core::http_client::build_client;
use compliance_engine::core::show_result_with_table::show_result_with_table;
use compliance_engine::models::args::{Args, Command};
use compliance_engine::models::backend::BackendTarget;
use compliance_engine::{run_from_config, write_report, ReportSink};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

async fn run_command(config: &Path) -> anyhow::Result<()> {
    let (settings, outcome) = run_from_config(config)
        .await
        .with_context(|| format!("run could not start from {}", config.display()))?;
    let sink = write_report(&outcome.report, settings.output.as_deref()).context("report not written")?;
    if let ReportSink::File(_) = sink {
        show_result_with_table(&outcome.report);
    }
    Ok(())
}

async fn discover_command(config: &Path, methods: &[String]) -> anyhow::Result<()> {
    // discovery needs only the back end, not a contract
    let file = load_config_file(config).with_context(|| format!("config not loaded from {}", config.display()))?;
    let url = file.url.as_deref().map(resolve_env).context("config names no back end url")?;
    let mut target = BackendTarget::new(url);
    if let Some(version) = file.backendversion.as_deref().map(resolve_env) {
        target = target.with_version(version);
    }
    let client = build_client().context("http client not built")?;
    let timeout = file.timeout.map(Duration::from_secs);
    resolve_version(&client, &mut target, timeout).await;
    let proposed = discover_endpoints(&client, &target, methods, timeout)
        .await
        .context("capabilities not readable")?;
    print!("{}", render_endpoint_table(&proposed).context("endpoint table not rendered")?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_json);

    let result = match &args.command {
        Command::Run { config } => run_command(config).await,
        Command::Discover { config, methods } => discover_command(config, methods).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
