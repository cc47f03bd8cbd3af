use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

/// Environment variable holding a tracing filter directive, e.g. `harvest=debug`.
const ENV_LOG: &str = "HARVEST_LOG";

#[derive(Parser)]
#[command(name = "harvest")]
#[command(version, about = "Run hardware-compilation experiments and collect their artifacts")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Workspace holding the checkouts and the results tree
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Path to harvest.toml. Defaults to <workspace>/harvest.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Clone, Default)]
pub struct RunArgs {
    /// Run only these experiments (comma-separated IDs)
    #[arg(long)]
    pub only: Option<String>,

    /// Phases to run: discovery, lowering, both, figure
    #[arg(long, default_value = "lowering")]
    pub phase: String,

    /// Print the plan without invoking the tool or touching results
    #[arg(long)]
    pub dry_run: bool,

    /// Write a JSON run summary to this file
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run experiments (the default when no command is given)
    Run(RunArgs),
    /// List the experiment catalogue
    List,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default harvest.toml file
    Init,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        None => cmd::cmd_run(&cli, &cli.run).await?,
        Some(Commands::Run(args)) => cmd::cmd_run(&cli, args).await?,
        Some(Commands::List) => cmd::cmd_list(&cli)?,
        Some(Commands::Config { command }) => cmd::cmd_config(&cli, command.clone())?,
    }

    Ok(())
}
