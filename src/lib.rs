pub mod artifacts;
pub mod catalogue;
pub mod config;
pub mod errors;
pub mod experiment;
pub mod invoke;
pub mod naming;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod snapshot;
