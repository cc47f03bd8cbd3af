//! Configuration for the harness, read from `harvest.toml`.
//!
//! Settings are layered file → environment → CLI. Every key has a default matching the
//! container layout the experiments were written for, so running with no file at all
//! is the common case.
//!
//! # Configuration File Format
//!
//! ```toml
//! [workspace]
//! root = "/workspace"
//! results_dir = "results"          # relative paths resolve against root
//! checkout_prefix = "shir-"
//! scripts_dir = "scripts"
//!
//! [tool]
//! command = "sbt"
//! args = ["-J-Xss32m"]
//! target_template = "testOnly {target}"
//!
//! [snapshot]
//! excluded_dirs = [".git", "target", "project", ".idea", ".bsp", ".metals"]
//!
//! [lowering]
//! output_dir = "out"
//! layout = "whole-directory"       # or "single-subdirectory"
//!
//! [results]
//! discovery_dir = "eqsat"
//! lowering_dir = "vhdl"
//! figure_dir = "figure"
//!
//! # Optional: replaces the built-in catalogue entirely.
//! [[experiments]]
//! id = "1-vgg"
//! description = "1. VGG"
//! discovery = { branch = "new-test-tag", path = "src/test/eqsat/nn/SingleVGGTest.scala" }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalogue::Catalogue;
use crate::errors::ConfigError;
use crate::experiment::{Experiment, LoweringLayout, PhaseKind};
use crate::naming::{TARGET_PLACEHOLDER, is_plain_relative};
use crate::snapshot::DEFAULT_EXCLUDED_DIRS;

/// Name of the configuration file looked up in the workspace root.
pub const CONFIG_FILE: &str = "harvest.toml";

/// Environment variable overriding `[workspace] root`.
pub const ENV_WORKSPACE: &str = "HARVEST_WORKSPACE";

/// Environment variable overriding `[tool] command`.
pub const ENV_TOOL: &str = "HARVEST_TOOL";

/// Workspace layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSection {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// Checkouts live at `<root>/<checkout_prefix><branch>`
    #[serde(default = "default_checkout_prefix")]
    pub checkout_prefix: String,
    /// Auxiliary scripts copied once into the results tree
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from("/workspace")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_checkout_prefix() -> String {
    "shir-".to_string()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            results_dir: default_results_dir(),
            checkout_prefix: default_checkout_prefix(),
            scripts_dir: default_scripts_dir(),
        }
    }
}

/// External build/test tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSection {
    #[serde(default = "default_tool_command")]
    pub command: String,
    /// Arguments placed before the rendered target
    #[serde(default = "default_tool_args")]
    pub args: Vec<String>,
    /// Single argument naming what to run; `{target}` is the dotted test name
    #[serde(default = "default_target_template")]
    pub target_template: String,
}

fn default_tool_command() -> String {
    "sbt".to_string()
}

fn default_tool_args() -> Vec<String> {
    vec!["-J-Xss32m".to_string()]
}

fn default_target_template() -> String {
    format!("testOnly {}", TARGET_PLACEHOLDER)
}

impl Default for ToolSection {
    fn default() -> Self {
        Self {
            command: default_tool_command(),
            args: default_tool_args(),
            target_template: default_target_template(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSection {
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,
}

fn default_excluded_dirs() -> Vec<String> {
    DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect()
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            excluded_dirs: default_excluded_dirs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoweringSection {
    /// Directory the tool writes lowering output into, relative to the checkout
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Layout used when an experiment does not declare one
    #[serde(default)]
    pub layout: LoweringLayout,
}

fn default_output_dir() -> String {
    "out".to_string()
}

impl Default for LoweringSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            layout: LoweringLayout::default(),
        }
    }
}

/// Per-phase subdirectory names under `results/<experiment-id>/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsSection {
    #[serde(default = "default_discovery_dir")]
    pub discovery_dir: String,
    #[serde(default = "default_lowering_dir")]
    pub lowering_dir: String,
    #[serde(default = "default_figure_dir")]
    pub figure_dir: String,
}

fn default_discovery_dir() -> String {
    "eqsat".to_string()
}

fn default_lowering_dir() -> String {
    "vhdl".to_string()
}

fn default_figure_dir() -> String {
    "figure".to_string()
}

impl Default for ResultsSection {
    fn default() -> Self {
        Self {
            discovery_dir: default_discovery_dir(),
            lowering_dir: default_lowering_dir(),
            figure_dir: default_figure_dir(),
        }
    }
}

impl ResultsSection {
    pub fn subdir(&self, kind: PhaseKind) -> &str {
        match kind {
            PhaseKind::Discovery => &self.discovery_dir,
            PhaseKind::Lowering => &self.lowering_dir,
            PhaseKind::Figure => &self.figure_dir,
        }
    }
}

/// The complete harvest.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestToml {
    #[serde(default)]
    pub workspace: WorkspaceSection,
    #[serde(default)]
    pub tool: ToolSection,
    #[serde(default)]
    pub snapshot: SnapshotSection,
    #[serde(default)]
    pub lowering: LoweringSection,
    #[serde(default)]
    pub results: ResultsSection,
    /// Replaces the built-in catalogue when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub experiments: Vec<Experiment>,
}

impl HarvestToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse harvest.toml")
    }

    /// Load `<dir>/harvest.toml`, or defaults if it does not exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize harvest.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// The catalogue this configuration selects.
    pub fn catalogue(&self) -> Result<Catalogue, ConfigError> {
        if self.experiments.is_empty() {
            Ok(Catalogue::builtin())
        } else {
            Catalogue::new(self.experiments.clone())
        }
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup(ENV_WORKSPACE).filter(|v| !v.is_empty()) {
            self.workspace.root = PathBuf::from(root);
        }
        if let Some(tool) = lookup(ENV_TOOL).filter(|v| !v.is_empty()) {
            self.tool.command = tool;
        }
    }

    /// Hard errors that make the configuration unusable.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.tool.command.trim().is_empty() {
            return Err(ConfigError::EmptyToolCommand);
        }
        // The output directory is deleted before every lowering run.
        if !is_plain_relative(&self.lowering.output_dir) {
            return Err(ConfigError::InvalidOutputDir(self.lowering.output_dir.clone()));
        }
        // So is each results subdirectory before it is refilled.
        for (key, value) in [
            ("discovery_dir", &self.results.discovery_dir),
            ("lowering_dir", &self.results.lowering_dir),
            ("figure_dir", &self.results.figure_dir),
        ] {
            if !is_plain_relative(value) {
                return Err(ConfigError::InvalidResultsDir {
                    key,
                    value: value.clone(),
                });
            }
        }
        self.catalogue().map(|_| ())
    }

    /// Suspicious but usable settings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.tool.target_template.contains(TARGET_PLACEHOLDER) {
            warnings.push(format!(
                "target_template '{}' has no {} placeholder; the test name will be appended",
                self.tool.target_template, TARGET_PLACEHOLDER
            ));
        }
        if self.snapshot.excluded_dirs.is_empty() {
            warnings.push(
                "snapshot.excluded_dirs is empty; build caches will be walked and may be copied"
                    .to_string(),
            );
        }

        let subdirs = [
            &self.results.discovery_dir,
            &self.results.lowering_dir,
            &self.results.figure_dir,
        ];
        for (i, a) in subdirs.iter().enumerate() {
            if subdirs[i + 1..].contains(a) {
                warnings.push(format!(
                    "results subdirectory '{}' is shared by more than one phase",
                    a
                ));
            }
        }

        warnings
    }
}

/// Resolved runtime settings used by the runners and orchestrator.
#[derive(Debug, Clone)]
pub struct Settings {
    pub workspace: PathBuf,
    pub results_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub checkout_prefix: String,
    pub tool_command: String,
    pub tool_args: Vec<String>,
    pub target_template: String,
    pub excluded_dirs: Vec<String>,
    pub output_dir: String,
    pub default_layout: LoweringLayout,
    pub results: ResultsSection,
}

impl Settings {
    /// Resolve paths in `toml` against its workspace root.
    pub fn from_toml(toml: &HarvestToml) -> Self {
        let workspace = toml.workspace.root.clone();
        Self {
            results_dir: workspace.join(&toml.workspace.results_dir),
            scripts_dir: workspace.join(&toml.workspace.scripts_dir),
            workspace,
            checkout_prefix: toml.workspace.checkout_prefix.clone(),
            tool_command: toml.tool.command.clone(),
            tool_args: toml.tool.args.clone(),
            target_template: toml.tool.target_template.clone(),
            excluded_dirs: toml.snapshot.excluded_dirs.clone(),
            output_dir: toml.lowering.output_dir.clone(),
            default_layout: toml.lowering.layout,
            results: toml.results.clone(),
        }
    }

    /// Where the results for one phase of one experiment go.
    pub fn results_subdir(&self, experiment_id: &str, kind: PhaseKind) -> PathBuf {
        self.results_dir
            .join(experiment_id)
            .join(self.results.subdir(kind))
    }
}

/// Configuration as loaded for one CLI invocation.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// The config file that was read, if any
    pub source: Option<PathBuf>,
    pub toml: HarvestToml,
    pub settings: Settings,
    pub catalogue: Catalogue,
}

impl HarvestConfig {
    /// Load configuration with the usual precedence.
    ///
    /// The file is `config_path` when given, otherwise `harvest.toml` in the workspace
    /// (`cli_workspace`, else `$HARVEST_WORKSPACE`, else `/workspace`). After the file,
    /// environment overrides apply, then `cli_workspace`.
    pub fn load(config_path: Option<&Path>, cli_workspace: Option<&Path>) -> Result<Self> {
        Self::load_with_env(config_path, cli_workspace, |key| std::env::var(key).ok())
    }

    pub fn load_with_env(
        config_path: Option<&Path>,
        cli_workspace: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let (source, mut toml) = match config_path {
            Some(path) => (Some(path.to_path_buf()), HarvestToml::load(path)?),
            None => {
                let dir = cli_workspace
                    .map(Path::to_path_buf)
                    .or_else(|| lookup(ENV_WORKSPACE).filter(|v| !v.is_empty()).map(PathBuf::from))
                    .unwrap_or_else(default_root);
                let path = dir.join(CONFIG_FILE);
                let source = path.exists().then_some(path);
                (source, HarvestToml::load_or_default(&dir)?)
            }
        };

        toml.apply_env_from(&lookup);
        if let Some(dir) = cli_workspace {
            toml.workspace.root = dir.to_path_buf();
        }
        toml.check()?;

        let catalogue = toml.catalogue()?;
        let settings = Settings::from_toml(&toml);
        Ok(Self {
            source,
            toml,
            settings,
            catalogue,
        })
    }
}
