pub mod args;
pub mod backend;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod report;
pub mod request;
pub mod variable_store;
pub mod verdict;
