//! Typed error hierarchy for the harness.
//!
//! Two enums cover the conditions callers need to match on:
//! - `PhaseError`: fatal outcomes of a single phase run
//! - `ConfigError`: an unusable configuration or catalogue
//!
//! Everything else travels as `anyhow::Error` with context attached.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors from a phase run. Any of these aborts the whole batch.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{invocation}` failed in {} ({})", .dir.display(), describe_exit(.exit_code))]
    ToolFailed {
        invocation: String,
        dir: PathBuf,
        exit_code: Option<i32>,
    },

    #[error("Expected `{invocation}` to fail in {}, but it succeeded", .dir.display())]
    UnexpectedSuccess { invocation: String, dir: PathBuf },

    #[error("Checkout for branch '{branch}' not found at {}", .path.display())]
    CheckoutMissing { branch: String, path: PathBuf },

    #[error(
        "Expected exactly one subdirectory in {}, found {}{}",
        .dir.display(),
        .found.len(),
        list_found(.found)
    )]
    AmbiguousOutput { dir: PathBuf, found: Vec<String> },
}

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Duplicate experiment id '{0}'")]
    DuplicateExperiment(String),

    #[error("Experiment at position {0} has an empty id")]
    EmptyExperimentId(usize),

    #[error("Experiment id '{0}' must be a single directory name")]
    InvalidExperimentId(String),

    #[error("Experiment '{id}': expect_failure is only supported on the discovery phase, not {phase}")]
    ExpectFailureNotSupported { id: String, phase: String },

    #[error("Experiment '{id}': layout is only meaningful on the lowering phase, not {phase}")]
    LayoutNotSupported { id: String, phase: String },

    #[error("Tool command is empty")]
    EmptyToolCommand,

    #[error("lowering.output_dir must name a directory inside the checkout, got '{0}'")]
    InvalidOutputDir(String),

    #[error("results.{key} must name a directory inside the results tree, got '{value}'")]
    InvalidResultsDir { key: &'static str, value: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn list_found(found: &[String]) -> String {
    if found.is_empty() {
        String::new()
    } else {
        format!(": {}", found.join(", "))
    }
}
