//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled           |
//! |----------|----------------------------|
//! | `run`    | `Run` (also the default)   |
//! | `list`   | `List`                     |
//! | `config` | `Config`                   |

pub mod config;
pub mod list;
pub mod run;

pub use config::cmd_config;
pub use list::cmd_list;
pub use run::cmd_run;

use anyhow::Result;
use harvest::config::HarvestConfig;

use super::Cli;

/// Load configuration using the global `--config` and `--workspace` flags.
pub fn load_config(cli: &Cli) -> Result<HarvestConfig> {
    HarvestConfig::load(cli.config.as_deref(), cli.workspace.as_deref())
}
