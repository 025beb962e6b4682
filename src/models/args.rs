use std::path::PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Validates a back end against an OpenAPI description file", long_about = None)]
pub struct Args {
    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every configured probe and write the report
    #[command(visible_aliases = ["config", "c"])]
    Run {
        /// Configuration file (TOML, or JSON by extension)
        config: PathBuf,
    },
    /// Propose probes from the back end's capabilities document
    Discover {
        /// Configuration file naming the back end
        config: PathBuf,

        /// Request methods to propose probes for
        #[arg(short, long = "method", default_value = "GET")]
        methods: Vec<String>,
    },
}
