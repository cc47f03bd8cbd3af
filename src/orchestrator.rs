//! Sequential orchestration of experiments and their phases.
//!
//! Experiments run one at a time in catalogue order; within an experiment the selected
//! phases run in the fixed order discovery, lowering, figure. The first fatal error
//! stops the batch.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

use crate::artifacts::copy_tree;
use crate::catalogue::Catalogue;
use crate::experiment::{Experiment, PhaseKind};
use crate::naming::checkout_dir;
use crate::report::{PhaseOutcome, PhaseRecord, RunSummary};
use crate::runner::PhaseRunner;

/// Which phases a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseSelector {
    Discovery,
    #[default]
    Lowering,
    /// Discovery, then lowering.
    Both,
    Figure,
}

impl PhaseSelector {
    /// Selected phase kinds in execution order.
    pub fn kinds(self) -> &'static [PhaseKind] {
        match self {
            PhaseSelector::Discovery => &[PhaseKind::Discovery],
            PhaseSelector::Lowering => &[PhaseKind::Lowering],
            PhaseSelector::Both => &[PhaseKind::Discovery, PhaseKind::Lowering],
            PhaseSelector::Figure => &[PhaseKind::Figure],
        }
    }
}

impl std::fmt::Display for PhaseSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseSelector::Discovery => write!(f, "discovery"),
            PhaseSelector::Lowering => write!(f, "lowering"),
            PhaseSelector::Both => write!(f, "both"),
            PhaseSelector::Figure => write!(f, "figure"),
        }
    }
}

impl std::str::FromStr for PhaseSelector {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discovery" | "eqsat" => Ok(PhaseSelector::Discovery),
            "lowering" => Ok(PhaseSelector::Lowering),
            "both" => Ok(PhaseSelector::Both),
            "figure" => Ok(PhaseSelector::Figure),
            _ => anyhow::bail!(
                "Invalid phase '{}'. Valid values: discovery, lowering, both, figure",
                s
            ),
        }
    }
}

/// Options for one orchestrated run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Experiment ids to run; `None` runs the whole catalogue
    pub only: Option<BTreeSet<String>>,
    pub phases: PhaseSelector,
    /// Plan the run without invoking the tool or touching the filesystem
    pub dry_run: bool,
}

pub struct Orchestrator {
    catalogue: Catalogue,
    runner: PhaseRunner,
}

impl Orchestrator {
    pub fn new(catalogue: Catalogue, runner: PhaseRunner) -> Self {
        Self { catalogue, runner }
    }

    /// Run the selected phases of the selected experiments.
    ///
    /// Returns a record for every phase visited. A fatal phase error is returned as-is
    /// and no later phase or experiment runs.
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let settings = self.runner.settings();
        let mut summary = RunSummary::new(&settings.results_dir);

        let selection = self.catalogue.select(options.only.as_ref());
        if !selection.unknown.is_empty() {
            warn!("Unknown experiment IDs: {}", selection.unknown.join(", "));
            summary.unknown_ids = selection.unknown.clone();
        }

        if !options.dry_run {
            std::fs::create_dir_all(&settings.results_dir).with_context(|| {
                format!(
                    "Failed to create results directory: {}",
                    settings.results_dir.display()
                )
            })?;
            copy_scripts_once(&settings.scripts_dir, &settings.results_dir)?;
        }
        info!("Results will be stored under: {}", settings.results_dir.display());

        for exp in selection.experiments {
            for &kind in options.phases.kinds() {
                let record = self.run_phase(exp, kind, options.dry_run).await?;
                summary.record(record);
            }
        }

        summary.finish();
        Ok(summary)
    }

    async fn run_phase(&self, exp: &Experiment, kind: PhaseKind, dry_run: bool) -> Result<PhaseRecord> {
        let Some(cfg) = exp.phase(kind) else {
            info!("Skipping {} phase for {}: not configured", kind, exp.id);
            return Ok(skipped(exp, kind, PhaseOutcome::NotConfigured));
        };

        if dry_run {
            let settings = self.runner.settings();
            let repo = checkout_dir(&settings.workspace, &settings.checkout_prefix, &cfg.branch);
            let invocation = self.runner.invoker().describe(&cfg.path);
            info!(
                "[dry-run] {} phase: {} -> {} in {}",
                kind,
                exp.id,
                invocation,
                repo.display()
            );
            return Ok(skipped(exp, kind, PhaseOutcome::DryRun { invocation }));
        }

        self.runner.run(exp, kind, cfg).await
    }
}

fn skipped(exp: &Experiment, kind: PhaseKind, outcome: PhaseOutcome) -> PhaseRecord {
    PhaseRecord {
        experiment: exp.id.clone(),
        phase: kind,
        failed_as_expected: false,
        outcome,
        duration_ms: 0,
    }
}

/// Copy `scripts_dir` to `<results_dir>/<name>` unless that destination already exists.
///
/// Returns whether a copy was made. A missing source is not an error.
pub fn copy_scripts_once(scripts_dir: &Path, results_dir: &Path) -> Result<bool> {
    let Some(name) = scripts_dir.file_name() else {
        info!(
            "Scripts directory {} has no name to copy under; skipping",
            scripts_dir.display()
        );
        return Ok(false);
    };
    let dest = results_dir.join(name);
    if dest.exists() {
        return Ok(false);
    }
    if !scripts_dir.is_dir() {
        info!("No scripts directory at {}; skipping", scripts_dir.display());
        return Ok(false);
    }
    let files = copy_tree(scripts_dir, &dest)?;
    info!("Copied {} script file(s) to {}", files, dest.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::parse_id_list;
    use crate::config::{HarvestToml, Settings};
    use crate::errors::PhaseError;
    use crate::experiment::PhaseConfig;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    #[test]
    fn test_selector_kinds_order() {
        assert_eq!(
            PhaseSelector::Both.kinds(),
            &[PhaseKind::Discovery, PhaseKind::Lowering]
        );
        assert_eq!(PhaseSelector::default(), PhaseSelector::Lowering);
        assert_eq!(PhaseSelector::Figure.kinds(), &[PhaseKind::Figure]);
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!("eqsat".parse::<PhaseSelector>().unwrap(), PhaseSelector::Discovery);
        assert_eq!("BOTH".parse::<PhaseSelector>().unwrap(), PhaseSelector::Both);
        for selector in [
            PhaseSelector::Discovery,
            PhaseSelector::Lowering,
            PhaseSelector::Both,
            PhaseSelector::Figure,
        ] {
            assert_eq!(selector.to_string().parse::<PhaseSelector>().unwrap(), selector);
        }
        assert!("all".parse::<PhaseSelector>().is_err());
    }

    #[test]
    fn test_copy_scripts_once() {
        let ws = tempdir().unwrap();
        let scripts = ws.path().join("scripts");
        fs::create_dir_all(scripts.join("syntest/sw")).unwrap();
        fs::write(scripts.join("syntest/sw/hello.cpp"), "int main() {}").unwrap();
        let results = ws.path().join("results");

        assert!(copy_scripts_once(&scripts, &results).unwrap());
        assert!(results.join("scripts/syntest/sw/hello.cpp").exists());

        // Present already: left alone even if the source changed.
        fs::write(scripts.join("new.sh"), "").unwrap();
        assert!(!copy_scripts_once(&scripts, &results).unwrap());
        assert!(!results.join("scripts/new.sh").exists());
    }

    #[test]
    fn test_copy_scripts_skips_unnamed_source() {
        let ws = tempdir().unwrap();
        let results = ws.path().join("results");
        fs::create_dir_all(&results).unwrap();

        let copied = copy_scripts_once(Path::new("."), &results).unwrap();

        assert!(!copied);
        assert_eq!(fs::read_dir(&results).unwrap().count(), 0);
    }

    #[test]
    fn test_copy_scripts_missing_source() {
        let ws = tempdir().unwrap();
        let copied = copy_scripts_once(&ws.path().join("scripts"), &ws.path().join("results")).unwrap();
        assert!(!copied);
    }

    #[cfg(unix)]
    mod runs {
        use super::*;

        /// Workspace with checkout `shir-main`. The tool script appends each target it
        /// is given to `<workspace>/calls.log`, writes `out/<target>.v` plus
        /// `<target>.txt`, and fails for targets containing `Fail`.
        fn workspace() -> (TempDir, Settings) {
            let ws = tempdir().unwrap();
            fs::create_dir_all(ws.path().join("shir-main")).unwrap();
            let log = ws.path().join("calls.log");
            let script = ws.path().join("tool.sh");
            fs::write(
                &script,
                format!(
                    "echo \"$1\" >> '{}'\nmkdir -p out && echo v > \"out/$1.v\"\necho t > \"$1.txt\"\ncase \"$1\" in *Fail*) exit 1;; esac\n",
                    log.display()
                ),
            )
            .unwrap();

            let mut toml = HarvestToml::default();
            toml.workspace.root = ws.path().to_path_buf();
            toml.tool.command = "sh".to_string();
            toml.tool.args = vec![script.to_string_lossy().into_owned()];
            toml.tool.target_template = "{target}".to_string();
            (ws, Settings::from_toml(&toml))
        }

        fn calls(ws: &TempDir) -> Vec<String> {
            fs::read_to_string(ws.path().join("calls.log"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn catalogue() -> Catalogue {
            Catalogue::new(vec![
                Experiment::new(
                    "X",
                    "first",
                    Some(PhaseConfig::new("main", "src/test/XDisc.scala")),
                    Some(PhaseConfig::new("main", "src/test/XLow.scala")),
                ),
                Experiment::new(
                    "Z",
                    "discovery only",
                    Some(PhaseConfig::new("main", "src/test/ZDisc.scala")),
                    None,
                ),
                Experiment::new(
                    "F",
                    "fails",
                    None,
                    Some(PhaseConfig::new("main", "src/test/FailLow.scala")),
                ),
                Experiment::new(
                    "W",
                    "after failure",
                    None,
                    Some(PhaseConfig::new("main", "src/test/WLow.scala")),
                ),
            ])
            .unwrap()
        }

        fn orchestrator(settings: &Settings) -> Orchestrator {
            Orchestrator::new(catalogue(), PhaseRunner::new(settings.clone()))
        }

        #[tokio::test]
        async fn test_filter_runs_known_ids_and_reports_unknown() {
            let (ws, settings) = workspace();
            let options = RunOptions {
                only: Some(parse_id_list("X,Y")),
                phases: PhaseSelector::Lowering,
                dry_run: false,
            };

            let summary = orchestrator(&settings).run(&options).await.unwrap();

            assert_eq!(summary.unknown_ids, vec!["Y".to_string()]);
            assert_eq!(calls(&ws), vec!["XLow"]);
            assert_eq!(summary.phases.len(), 1);
            assert!(settings.results_dir.join("X/vhdl/XLow.v").exists());
        }

        #[tokio::test]
        async fn test_both_runs_discovery_then_lowering_and_skips_unconfigured() {
            let (ws, settings) = workspace();
            let options = RunOptions {
                only: Some(parse_id_list("X,Z")),
                phases: PhaseSelector::Both,
                dry_run: false,
            };

            let summary = orchestrator(&settings).run(&options).await.unwrap();

            assert_eq!(calls(&ws), vec!["XDisc", "XLow", "ZDisc"]);
            let kinds: Vec<(String, PhaseKind)> = summary
                .phases
                .iter()
                .map(|r| (r.experiment.clone(), r.phase))
                .collect();
            assert_eq!(
                kinds,
                vec![
                    ("X".to_string(), PhaseKind::Discovery),
                    ("X".to_string(), PhaseKind::Lowering),
                    ("Z".to_string(), PhaseKind::Discovery),
                    ("Z".to_string(), PhaseKind::Lowering),
                ]
            );
            assert_eq!(summary.phases[3].outcome, PhaseOutcome::NotConfigured);
            // Discovery saw the new summary file and the new out/ tree.
            let eqsat = settings.results_dir.join("X/eqsat");
            assert!(eqsat.join("XDisc.txt").exists());
            assert!(eqsat.join("out/XDisc.v").exists());
        }

        #[tokio::test]
        async fn test_fatal_error_stops_the_batch() {
            let (ws, settings) = workspace();
            let options = RunOptions {
                only: None,
                phases: PhaseSelector::Lowering,
                dry_run: false,
            };

            let err = orchestrator(&settings).run(&options).await.unwrap_err();

            assert!(matches!(
                err.downcast_ref::<PhaseError>(),
                Some(PhaseError::ToolFailed { .. })
            ));
            // X ran, Z has no lowering, F failed, W never started.
            assert_eq!(calls(&ws), vec!["XLow", "FailLow"]);
            assert!(!settings.results_dir.join("W").exists());
        }

        #[tokio::test]
        async fn test_figure_selector_skips_experiments_without_figure() {
            let (ws, settings) = workspace();
            let options = RunOptions {
                only: Some(parse_id_list("X")),
                phases: PhaseSelector::Figure,
                dry_run: false,
            };

            let summary = orchestrator(&settings).run(&options).await.unwrap();

            assert!(calls(&ws).is_empty());
            assert_eq!(summary.phases[0].outcome, PhaseOutcome::NotConfigured);
        }

        #[tokio::test]
        async fn test_dry_run_touches_nothing() {
            let (ws, settings) = workspace();
            let options = RunOptions {
                only: None,
                phases: PhaseSelector::Both,
                dry_run: true,
            };

            let summary = orchestrator(&settings).run(&options).await.unwrap();

            assert!(calls(&ws).is_empty());
            assert!(!settings.results_dir.exists());
            let planned = summary
                .phases
                .iter()
                .filter(|r| matches!(r.outcome, PhaseOutcome::DryRun { .. }))
                .count();
            // X: 2, Z: 1, F: 1, W: 1
            assert_eq!(planned, 5);
            assert_eq!(summary.executed().count(), 0);
        }

        #[tokio::test]
        async fn test_run_copies_scripts_into_results() {
            let (ws, settings) = workspace();
            fs::create_dir_all(ws.path().join("scripts")).unwrap();
            fs::write(ws.path().join("scripts/plot.py"), "print()").unwrap();
            let options = RunOptions {
                only: Some(BTreeSet::new()),
                phases: PhaseSelector::Lowering,
                dry_run: false,
            };

            let summary = orchestrator(&settings).run(&options).await.unwrap();

            assert!(summary.phases.is_empty());
            assert!(ws.path().join("results/scripts/plot.py").exists());
        }
    }
}
