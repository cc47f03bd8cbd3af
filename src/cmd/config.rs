//! Configuration view and validation commands, `harvest config`.

use anyhow::Result;
use std::path::PathBuf;

use harvest::config::{CONFIG_FILE, ENV_WORKSPACE, HarvestConfig, HarvestToml};

use super::super::{Cli, ConfigCommands};

/// The file `config` subcommands operate on.
fn config_path(cli: &Cli) -> PathBuf {
    if let Some(path) = &cli.config {
        return path.clone();
    }
    let workspace = cli
        .workspace
        .clone()
        .or_else(|| {
            std::env::var(ENV_WORKSPACE)
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| HarvestToml::default().workspace.root);
    workspace.join(CONFIG_FILE)
}

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config_path(cli);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Harvest Configuration");
            println!("=====================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No harvest.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            let config = HarvestConfig::load(cli.config.as_deref(), cli.workspace.as_deref())?;
            let toml = &config.toml;

            println!("[workspace]");
            println!("  root = \"{}\"", toml.workspace.root.display());
            println!("  results_dir = \"{}\"", toml.workspace.results_dir.display());
            println!("  checkout_prefix = \"{}\"", toml.workspace.checkout_prefix);
            println!("  scripts_dir = \"{}\"", toml.workspace.scripts_dir.display());
            println!();

            println!("[tool]");
            println!("  command = \"{}\"", toml.tool.command);
            println!("  args = {:?}", toml.tool.args);
            println!("  target_template = \"{}\"", toml.tool.target_template);
            println!();

            println!("[snapshot]");
            println!("  excluded_dirs = {:?}", toml.snapshot.excluded_dirs);
            println!();

            println!("[lowering]");
            println!("  output_dir = \"{}\"", toml.lowering.output_dir);
            println!("  layout = \"{}\"", toml.lowering.layout);
            println!();

            println!("[results]");
            println!("  discovery_dir = \"{}\"", toml.results.discovery_dir);
            println!("  lowering_dir = \"{}\"", toml.results.lowering_dir);
            println!("  figure_dir = \"{}\"", toml.results.figure_dir);
            println!();

            println!("Effective values (with env/CLI overrides):");
            println!("  workspace = \"{}\"", config.settings.workspace.display());
            println!("  results = \"{}\"", config.settings.results_dir.display());
            println!("  tool = \"{}\"", config.settings.tool_command);
            if toml.experiments.is_empty() {
                println!("  experiments = {} (built-in)", config.catalogue.len());
            } else {
                println!("  experiments = {} (from config)", config.catalogue.len());
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No harvest.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = HarvestToml::load(&config_path)?;
            toml.check()?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("harvest.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            let mut toml = HarvestToml::default();
            if let Some(workspace) = &cli.workspace {
                toml.workspace.root = workspace.clone();
            }
            toml.save(&config_path)?;

            println!("Created harvest.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [workspace] root, results_dir, checkout_prefix");
            println!("  - [tool] command, args, target_template");
            println!("  - [lowering] output_dir, layout");
            println!("  - [[experiments]] to replace the built-in catalogue");
            println!();
        }
    }

    Ok(())
}
