//! Phase runners.
//!
//! Discovery and figure phases share one routine: snapshot the checkout, run the tool,
//! snapshot again, and copy whatever appeared. Lowering instead owns a fixed output
//! directory that it clears before the run and harvests afterwards.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::artifacts::{copy_relative_paths, copy_tree, immediate_subdirs, remove_dir_if_exists};
use crate::config::Settings;
use crate::errors::PhaseError;
use crate::experiment::{Experiment, LoweringLayout, PhaseConfig, PhaseKind};
use crate::invoke::{ExitPolicy, ToolInvoker, ToolOutcome};
use crate::naming::checkout_dir;
use crate::report::{PhaseOutcome, PhaseRecord};
use crate::snapshot::Snapshot;

/// Runs individual phases against the checkouts described by `Settings`.
pub struct PhaseRunner {
    settings: Settings,
    invoker: ToolInvoker,
}

impl PhaseRunner {
    pub fn new(settings: Settings) -> Self {
        let invoker = ToolInvoker::from_settings(&settings);
        Self { settings, invoker }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn invoker(&self) -> &ToolInvoker {
        &self.invoker
    }

    /// The checkout directory for `cfg`, which must already exist.
    pub fn checkout(&self, cfg: &PhaseConfig) -> Result<PathBuf, PhaseError> {
        let path = checkout_dir(
            &self.settings.workspace,
            &self.settings.checkout_prefix,
            &cfg.branch,
        );
        if !path.is_dir() {
            return Err(PhaseError::CheckoutMissing {
                branch: cfg.branch.clone(),
                path,
            });
        }
        Ok(path)
    }

    /// Run one phase of `exp` with `cfg`, dispatching on `kind`.
    pub async fn run(
        &self,
        exp: &Experiment,
        kind: PhaseKind,
        cfg: &PhaseConfig,
    ) -> Result<PhaseRecord> {
        info!(
            "==== {} phase: {} ({}) ====",
            kind, exp.id, exp.description
        );
        let start = Instant::now();

        let (outcome, tool) = match kind {
            PhaseKind::Discovery => {
                let policy = ExitPolicy::from_expect_failure(cfg.expect_failure);
                self.run_snapshot_phase(exp, kind, cfg, policy).await?
            }
            PhaseKind::Figure => {
                self.run_snapshot_phase(exp, kind, cfg, ExitPolicy::ExpectSuccess)
                    .await?
            }
            PhaseKind::Lowering => self.run_lowering_phase(exp, cfg).await?,
        };

        Ok(PhaseRecord {
            experiment: exp.id.clone(),
            phase: kind,
            failed_as_expected: matches!(tool, ToolOutcome::FailedAsExpected { .. }),
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Snapshot-diff phase shared by discovery and figure.
    ///
    /// New files are copied into the `kind` results subdirectory, replacing whatever a
    /// previous run left there. No new files is a warning, not an error.
    pub async fn run_snapshot_phase(
        &self,
        exp: &Experiment,
        kind: PhaseKind,
        cfg: &PhaseConfig,
        policy: ExitPolicy,
    ) -> Result<(PhaseOutcome, ToolOutcome)> {
        let repo = self.checkout(cfg)?;
        let excluded = self.settings.excluded_dirs.as_slice();

        let before = Snapshot::capture(&repo, excluded)?;
        debug!("{} file(s) in {} before run", before.len(), repo.display());

        let tool = self.invoker.run(&repo, &cfg.path, policy).await?;

        let after = Snapshot::capture(&repo, excluded)?;
        let new_files = after.added_since(&before);

        if new_files.is_empty() {
            warn!("No new files detected for {} phase of {}; nothing to copy", kind, exp.id);
            return Ok((PhaseOutcome::NoNewArtifacts, tool));
        }

        let dest = self.settings.results_subdir(&exp.id, kind);
        info!("Copying {} new file(s) to {}", new_files.len(), dest.display());
        remove_dir_if_exists(&dest)?;
        let files = copy_relative_paths(&repo, &new_files, &dest)?;

        Ok((PhaseOutcome::Copied { files, dest }, tool))
    }

    /// Lowering phase: clear the output directory, run the tool, harvest the output.
    pub async fn run_lowering_phase(
        &self,
        exp: &Experiment,
        cfg: &PhaseConfig,
    ) -> Result<(PhaseOutcome, ToolOutcome)> {
        let repo = self.checkout(cfg)?;
        let out_dir = repo.join(&self.settings.output_dir);

        if remove_dir_if_exists(&out_dir)? {
            info!("Removed existing {} before run", out_dir.display());
        }

        let tool = self
            .invoker
            .run(&repo, &cfg.path, ExitPolicy::ExpectSuccess)
            .await?;

        if !out_dir.is_dir() {
            warn!(
                "Lowering phase of {} did not produce {}",
                exp.id,
                out_dir.display()
            );
            return Ok((PhaseOutcome::MissingOutput, tool));
        }

        let layout = cfg.layout.unwrap_or(self.settings.default_layout);
        // Resolve the source before touching the results tree, so an ambiguous layout
        // leaves previous results in place.
        let source = lowering_source(&out_dir, layout)?;

        let dest = self.settings.results_subdir(&exp.id, PhaseKind::Lowering);
        remove_dir_if_exists(&dest)?;
        info!(
            "Copying lowering output from {} to {}",
            source.display(),
            dest.display()
        );
        let files = copy_tree(&source, &dest)?;

        Ok((PhaseOutcome::Copied { files, dest }, tool))
    }
}

/// The directory whose contents become the lowering results.
pub fn lowering_source(out_dir: &Path, layout: LoweringLayout) -> Result<PathBuf> {
    match layout {
        LoweringLayout::WholeDirectory => Ok(out_dir.to_path_buf()),
        LoweringLayout::SingleSubdirectory => {
            let found = immediate_subdirs(out_dir)?;
            match found.as_slice() {
                [only] => Ok(out_dir.join(only)),
                _ => Err(PhaseError::AmbiguousOutput {
                    dir: out_dir.to_path_buf(),
                    found,
                }
                .into()),
            }
        }
    }
}
