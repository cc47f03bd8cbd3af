//! Experiment execution, `harvest run` and the bare `harvest` invocation.

use anyhow::{Context, Result};
use console::style;
use tracing::{info, warn};

use harvest::catalogue::id_filter;
use harvest::orchestrator::{Orchestrator, PhaseSelector, RunOptions};
use harvest::runner::PhaseRunner;

use super::super::{Cli, RunArgs};
use super::load_config;

pub async fn cmd_run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let phases: PhaseSelector = args.phase.parse()?;
    let config = load_config(cli)?;

    match &config.source {
        Some(path) => info!("Using configuration from {}", path.display()),
        None => info!("No harvest.toml found; using defaults"),
    }
    for warning in config.toml.validate() {
        warn!("{}", warning);
    }

    let options = RunOptions {
        only: id_filter(args.only.as_deref()),
        phases,
        dry_run: args.dry_run,
    };

    info!(
        "Running {} phase(s) for {} in {}",
        phases,
        options
            .only
            .as_ref()
            .map(|ids| ids.iter().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_else(|| "all experiments".to_string()),
        config.settings.workspace.display()
    );

    let orchestrator = Orchestrator::new(config.catalogue, PhaseRunner::new(config.settings));
    let summary = orchestrator.run(&options).await?;

    summary.print();
    if args.dry_run {
        println!("{}", style("Dry run: nothing was executed.").dim());
    }

    if let Some(path) = &args.summary {
        summary
            .save_json(path)
            .with_context(|| format!("Failed to save run summary to {}", path.display()))?;
        println!("Summary written to {}", path.display());
    }

    Ok(())
}
