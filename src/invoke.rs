//! Running the external build/test tool.
//!
//! The tool is a black box: it gets a working directory and one free-form target
//! argument, inherits our stdio, and is judged purely by its exit status.

use anyhow::Result;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Settings;
use crate::errors::PhaseError;
use crate::naming::{invocation_name, render_target};

/// What a phase expects the tool's exit status to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    ExpectSuccess,
    /// The experiment demonstrates a failure; a clean exit is a regression.
    ExpectFailure,
}

impl ExitPolicy {
    pub fn from_expect_failure(expect_failure: bool) -> Self {
        if expect_failure {
            ExitPolicy::ExpectFailure
        } else {
            ExitPolicy::ExpectSuccess
        }
    }
}

/// A tool run that met its exit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOutcome {
    Succeeded,
    FailedAsExpected { exit_code: Option<i32> },
}

/// Check an exit status against a policy.
///
/// `exit_code` is `None` when the process was terminated by a signal, which counts as a
/// failure.
pub fn judge_exit(
    exit_code: Option<i32>,
    policy: ExitPolicy,
    invocation: &str,
    dir: &Path,
) -> Result<ToolOutcome, PhaseError> {
    let succeeded = exit_code == Some(0);
    match (policy, succeeded) {
        (ExitPolicy::ExpectSuccess, true) => Ok(ToolOutcome::Succeeded),
        (ExitPolicy::ExpectSuccess, false) => Err(PhaseError::ToolFailed {
            invocation: invocation.to_string(),
            dir: dir.to_path_buf(),
            exit_code,
        }),
        (ExitPolicy::ExpectFailure, true) => Err(PhaseError::UnexpectedSuccess {
            invocation: invocation.to_string(),
            dir: dir.to_path_buf(),
        }),
        (ExitPolicy::ExpectFailure, false) => Ok(ToolOutcome::FailedAsExpected { exit_code }),
    }
}

/// Spawns the configured tool for one test at a time.
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    command: String,
    args: Vec<String>,
    target_template: String,
}

impl ToolInvoker {
    pub fn new(command: &str, args: Vec<String>, target_template: &str) -> Self {
        Self {
            command: command.to_string(),
            args,
            target_template: target_template.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.tool_command,
            settings.tool_args.clone(),
            &settings.target_template,
        )
    }

    /// The single target argument for `test_path`.
    pub fn target_for(&self, test_path: &str) -> String {
        render_target(&self.target_template, &invocation_name(test_path))
    }

    /// Human-readable command line for logs and dry runs.
    pub fn describe(&self, test_path: &str) -> String {
        let mut parts = vec![self.command.clone()];
        parts.extend(self.args.iter().cloned());
        parts.push(format!("\"{}\"", self.target_for(test_path)));
        parts.join(" ")
    }

    /// Run the tool in `dir` for `test_path` and check its exit status against `policy`.
    ///
    /// Blocks the calling task until the tool exits; there is no timeout.
    pub async fn run(
        &self,
        dir: &Path,
        test_path: &str,
        policy: ExitPolicy,
    ) -> Result<ToolOutcome, PhaseError> {
        let target = self.target_for(test_path);
        let invocation = format!("{} {}", self.command, target);
        info!("Running {} in {}", invocation, dir.display());

        let start = Instant::now();
        let status = Command::new(&self.command)
            .args(&self.args)
            .arg(&target)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| PhaseError::SpawnFailed {
                command: self.command.clone(),
                source,
            })?;

        let exit_code = status.code();
        debug!(
            "{} finished in {:.1}s (exit: {:?})",
            invocation,
            start.elapsed().as_secs_f64(),
            exit_code
        );

        let outcome = judge_exit(exit_code, policy, &invocation, dir)?;
        if let ToolOutcome::FailedAsExpected { exit_code } = outcome {
            info!(
                "{} failed as expected (exit code {})",
                invocation,
                exit_code.map_or_else(|| "none".to_string(), |c| c.to_string())
            );
        }
        Ok(outcome)
    }
}
