pub mod authenticate;
pub(crate) mod check_endpoints_ids;
pub mod config_loader;
pub mod contract;
pub mod discovery;
pub mod http_client;
pub mod orchestrator;
pub mod probe;
pub mod report_writer;
pub mod request_builder;
pub(crate) mod schema;
pub mod show_result_with_table;
pub mod substitute;
