//! Per-run bookkeeping: what each phase did, printed at the end of a run and
//! optionally written out as JSON.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use console::style;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::experiment::PhaseKind;

/// How a phase ended, short of a fatal error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PhaseOutcome {
    /// Artifacts were copied into `dest`.
    Copied { files: usize, dest: PathBuf },
    /// The tool ran but left no new files behind.
    NoNewArtifacts,
    /// The lowering output directory never appeared.
    MissingOutput,
    /// The experiment has no configuration for this phase.
    NotConfigured,
    /// Planned only; nothing was run.
    DryRun { invocation: String },
}

impl PhaseOutcome {
    fn label(&self) -> String {
        match self {
            PhaseOutcome::Copied { files, .. } => format!("{} file(s)", files),
            PhaseOutcome::NoNewArtifacts => "no new artifacts".to_string(),
            PhaseOutcome::MissingOutput => "no output directory".to_string(),
            PhaseOutcome::NotConfigured => "skipped".to_string(),
            PhaseOutcome::DryRun { .. } => "planned".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub experiment: String,
    pub phase: PhaseKind,
    /// Whether the tool exited non-zero as the experiment expected
    #[serde(default)]
    pub failed_as_expected: bool,
    pub outcome: PhaseOutcome,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub results_dir: PathBuf,
    pub unknown_ids: Vec<String>,
    pub phases: Vec<PhaseRecord>,
}

impl RunSummary {
    pub fn new(results_dir: &Path) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            results_dir: results_dir.to_path_buf(),
            unknown_ids: Vec::new(),
            phases: Vec::new(),
        }
    }

    pub fn record(&mut self, record: PhaseRecord) {
        self.phases.push(record);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Records for phases that actually ran.
    pub fn executed(&self) -> impl Iterator<Item = &PhaseRecord> {
        self.phases
            .iter()
            .filter(|r| !matches!(r.outcome, PhaseOutcome::NotConfigured | PhaseOutcome::DryRun { .. }))
    }

    pub fn files_copied(&self) -> usize {
        self.phases
            .iter()
            .map(|r| match r.outcome {
                PhaseOutcome::Copied { files, .. } => files,
                _ => 0,
            })
            .sum()
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize run summary")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write run summary: {}", path.display()))?;
        Ok(())
    }

    /// Print the end-of-run table.
    pub fn print(&self) {
        println!();
        println!("{}", style("Run summary").bold());
        println!("{:<28} {:<10} {}", "Experiment", "Phase", "Result");
        println!("{:<28} {:<10} {}", "-".repeat(28), "-".repeat(10), "------");
        for record in &self.phases {
            let result = match &record.outcome {
                PhaseOutcome::Copied { .. } => style(record.outcome.label()).green(),
                PhaseOutcome::NoNewArtifacts | PhaseOutcome::MissingOutput => {
                    style(record.outcome.label()).yellow()
                }
                _ => style(record.outcome.label()).dim(),
            };
            let note = if record.failed_as_expected {
                format!(" {}", style("(failed as expected)").dim())
            } else {
                String::new()
            };
            println!(
                "{:<28} {:<10} {}{}",
                record.experiment,
                record.phase.to_string(),
                result,
                note
            );
        }
        println!();
        println!(
            "{} phase(s) run, {} file(s) collected under {}",
            self.executed().count(),
            self.files_copied(),
            self.results_dir.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str, phase: PhaseKind, outcome: PhaseOutcome) -> PhaseRecord {
        PhaseRecord {
            experiment: id.to_string(),
            phase,
            failed_as_expected: false,
            outcome,
            duration_ms: 5,
        }
    }

    #[test]
    fn test_counts_only_executed_phases() {
        let mut summary = RunSummary::new(Path::new("/results"));
        summary.record(record(
            "a",
            PhaseKind::Discovery,
            PhaseOutcome::Copied {
                files: 2,
                dest: PathBuf::from("/results/a/eqsat"),
            },
        ));
        summary.record(record("a", PhaseKind::Lowering, PhaseOutcome::NotConfigured));
        summary.record(record("b", PhaseKind::Lowering, PhaseOutcome::MissingOutput));

        assert_eq!(summary.executed().count(), 2);
        assert_eq!(summary.files_copied(), 2);
    }

    #[test]
    fn test_save_json_writes_tagged_outcomes() {
        let dir = tempdir().unwrap();
        let mut summary = RunSummary::new(dir.path());
        summary.unknown_ids.push("Y".to_string());
        summary.record(record("X", PhaseKind::Figure, PhaseOutcome::NoNewArtifacts));
        summary.finish();

        let path = dir.path().join("reports/run.json");
        summary.save_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["unknown_ids"][0], "Y");
        assert_eq!(value["phases"][0]["phase"], "figure");
        assert_eq!(value["phases"][0]["outcome"]["status"], "no_new_artifacts");
        assert!(value["finished_at"].is_string());
    }
}
