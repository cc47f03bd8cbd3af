//! Catalogue listing, `harvest list`.

use anyhow::Result;
use console::style;

use harvest::experiment::{Experiment, PhaseKind};

use super::super::Cli;
use super::load_config;

pub fn cmd_list(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let catalogue = &config.catalogue;

    println!();
    match &config.source {
        Some(path) => println!("Experiments from: {}", path.display()),
        None => println!("Built-in experiments"),
    }
    println!();
    println!(
        "{:<24} {:<32} {:<24} {:<24} Figure",
        "ID", "Description", "Discovery", "Lowering"
    );
    println!(
        "{:<24} {:<32} {:<24} {:<24} ------",
        "-".repeat(24),
        "-".repeat(32),
        "-".repeat(24),
        "-".repeat(24)
    );

    for exp in catalogue.experiments() {
        println!(
            "{:<24} {:<32} {:<24} {:<24} {}",
            exp.id,
            exp.description,
            phase_cell(exp, PhaseKind::Discovery),
            phase_cell(exp, PhaseKind::Lowering),
            phase_cell(exp, PhaseKind::Figure),
        );
    }

    let phases: usize = catalogue
        .experiments()
        .iter()
        .map(|exp| exp.defined_phases().len())
        .sum();
    println!();
    println!(
        "{} experiment(s), {} phase(s)",
        style(catalogue.len()).bold(),
        phases
    );
    println!();
    Ok(())
}

/// Branch a phase runs on, with markers for expected failure and an explicit layout.
fn phase_cell(exp: &Experiment, kind: PhaseKind) -> String {
    let Some(cfg) = exp.phase(kind) else {
        return "-".to_string();
    };
    let mut cell = cfg.branch.clone();
    if cfg.expect_failure {
        cell.push_str(" (fails)");
    }
    if let Some(layout) = cfg.layout {
        cell.push_str(&format!(" [{}]", layout));
    }
    cell
}
