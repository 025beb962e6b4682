pub mod core;
pub mod models;

pub use crate::core::contract::{load_contract, ContractValidator, OpenApiContract};
pub use crate::core::orchestrator::{execution_order, run, run_from_config, SetupError};
pub use crate::core::report_writer::{write_report, ReportSink};
pub use crate::models::config::Settings;
pub use crate::models::report::{Report, RunOutcome};
pub use crate::models::verdict::{State, Verdict};
