//! Experiment and phase descriptors.
//!
//! An experiment names up to three phases, each pointing the build tool at one test
//! source on one branch checkout. Descriptors are plain immutable data; the built-in
//! table lives in [`crate::catalogue`] and may be replaced from `harvest.toml`.

use serde::{Deserialize, Serialize};

/// The three kinds of phase an experiment can define, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    /// Exploratory transformation; typically emits one or a few summary files.
    Discovery,
    /// Code lowering; emits a structured output directory.
    Lowering,
    /// Data generation for downstream plotting.
    Figure,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 3] = [PhaseKind::Discovery, PhaseKind::Lowering, PhaseKind::Figure];

    /// Whether a configuration for this kind may expect the tool to fail.
    pub fn supports_expect_failure(self) -> bool {
        matches!(self, PhaseKind::Discovery)
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseKind::Discovery => write!(f, "discovery"),
            PhaseKind::Lowering => write!(f, "lowering"),
            PhaseKind::Figure => write!(f, "figure"),
        }
    }
}

/// How the lowering output directory maps onto the results directory.
///
/// The tool's output layout changed between branch revisions, so the expected layout is
/// declared rather than guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoweringLayout {
    /// Copy the whole output directory as-is.
    #[default]
    WholeDirectory,
    /// The output directory wraps exactly one artifact directory; copy its contents.
    SingleSubdirectory,
}

impl std::fmt::Display for LoweringLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoweringLayout::WholeDirectory => write!(f, "whole-directory"),
            LoweringLayout::SingleSubdirectory => write!(f, "single-subdirectory"),
        }
    }
}

impl std::str::FromStr for LoweringLayout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whole-directory" | "whole" => Ok(LoweringLayout::WholeDirectory),
            "single-subdirectory" | "unwrap" => Ok(LoweringLayout::SingleSubdirectory),
            _ => anyhow::bail!(
                "Invalid lowering layout '{}'. Valid values: whole-directory, single-subdirectory",
                s
            ),
        }
    }
}

/// One phase of one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Branch whose checkout the tool runs in
    pub branch: String,
    /// Test source path relative to the checkout root
    pub path: String,
    /// Whether the tool is expected to exit non-zero
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub expect_failure: bool,
    /// Output layout for a lowering phase (falls back to the configured default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LoweringLayout>,
}

impl PhaseConfig {
    pub fn new(branch: &str, path: &str) -> Self {
        Self {
            branch: branch.to_string(),
            path: path.to_string(),
            expect_failure: false,
            layout: None,
        }
    }

    /// A phase that is expected to make the tool fail.
    pub fn expecting_failure(branch: &str, path: &str) -> Self {
        Self {
            expect_failure: true,
            ..Self::new(branch, path)
        }
    }

    pub fn with_layout(mut self, layout: LoweringLayout) -> Self {
        self.layout = Some(layout);
        self
    }
}

/// A named experiment with up to one configuration per phase kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub description: String,
    #[serde(default, alias = "eqsat", skip_serializing_if = "Option::is_none")]
    pub discovery: Option<PhaseConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowering: Option<PhaseConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figure: Option<PhaseConfig>,
}

impl Experiment {
    pub fn new(
        id: &str,
        description: &str,
        discovery: Option<PhaseConfig>,
        lowering: Option<PhaseConfig>,
    ) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            discovery,
            lowering,
            figure: None,
        }
    }

    pub fn with_figure(mut self, figure: PhaseConfig) -> Self {
        self.figure = Some(figure);
        self
    }

    /// The configuration for `kind`, if this experiment defines one.
    pub fn phase(&self, kind: PhaseKind) -> Option<&PhaseConfig> {
        match kind {
            PhaseKind::Discovery => self.discovery.as_ref(),
            PhaseKind::Lowering => self.lowering.as_ref(),
            PhaseKind::Figure => self.figure.as_ref(),
        }
    }

    /// Kinds this experiment defines, in execution order.
    pub fn defined_phases(&self) -> Vec<PhaseKind> {
        PhaseKind::ALL
            .into_iter()
            .filter(|kind| self.phase(*kind).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_lookup_by_kind() {
        let exp = Experiment::new(
            "1-vgg",
            "1. VGG",
            Some(PhaseConfig::new("a", "src/test/A.scala")),
            None,
        )
        .with_figure(PhaseConfig::new("b", "src/test/B.scala"));

        assert_eq!(exp.phase(PhaseKind::Discovery).unwrap().branch, "a");
        assert!(exp.phase(PhaseKind::Lowering).is_none());
        assert_eq!(exp.phase(PhaseKind::Figure).unwrap().branch, "b");
        assert_eq!(
            exp.defined_phases(),
            vec![PhaseKind::Discovery, PhaseKind::Figure]
        );
    }

    #[test]
    fn test_expecting_failure_sets_flag() {
        let cfg = PhaseConfig::expecting_failure("b", "p");
        assert!(cfg.expect_failure);
        assert!(!PhaseConfig::new("b", "p").expect_failure);
    }

    #[test]
    fn test_only_discovery_supports_expect_failure() {
        assert!(PhaseKind::Discovery.supports_expect_failure());
        assert!(!PhaseKind::Lowering.supports_expect_failure());
        assert!(!PhaseKind::Figure.supports_expect_failure());
    }

    #[test]
    fn test_layout_parse_and_display() {
        for layout in [LoweringLayout::WholeDirectory, LoweringLayout::SingleSubdirectory] {
            let parsed: LoweringLayout = layout.to_string().parse().unwrap();
            assert_eq!(parsed, layout);
        }
        assert_eq!(
            "unwrap".parse::<LoweringLayout>().unwrap(),
            LoweringLayout::SingleSubdirectory
        );
        assert!("nested".parse::<LoweringLayout>().is_err());
    }

    #[test]
    fn test_experiment_deserializes_eqsat_alias() {
        let exp: Experiment = toml::from_str(
            r#"
            id = "x"
            description = "X"

            [eqsat]
            branch = "main"
            path = "src/test/X.scala"
            expect_failure = true

            [lowering]
            branch = "main"
            path = "src/test/XLowering.scala"
            layout = "single-subdirectory"
            "#,
        )
        .unwrap();

        let discovery = exp.discovery.unwrap();
        assert!(discovery.expect_failure);
        assert_eq!(
            exp.lowering.unwrap().layout,
            Some(LoweringLayout::SingleSubdirectory)
        );
        assert!(exp.figure.is_none());
    }
}
