//! The ordered experiment catalogue.
//!
//! `builtin_catalogue()` is the authoritative table of experiments. A `harvest.toml`
//! with `[[experiments]]` entries replaces it wholesale; entries are never merged.

use std::collections::{BTreeSet, HashSet};

use crate::errors::ConfigError;
use crate::experiment::{Experiment, PhaseConfig, PhaseKind};
use crate::naming::is_plain_name;

/// An ordered, validated list of experiments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalogue {
    experiments: Vec<Experiment>,
}

/// Experiments picked out of a catalogue by an inclusion filter.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    /// Selected experiments in catalogue order
    pub experiments: Vec<&'a Experiment>,
    /// Requested ids with no matching experiment, sorted
    pub unknown: Vec<String>,
}

impl Catalogue {
    /// Build a catalogue, rejecting duplicate or empty ids, ids that are not a single
    /// directory name, and phase options that the phase kind does not support.
    pub fn new(experiments: Vec<Experiment>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for (index, exp) in experiments.iter().enumerate() {
            if exp.id.trim().is_empty() {
                return Err(ConfigError::EmptyExperimentId(index));
            }
            // Ids name the results directory that each phase clears.
            if !is_plain_name(&exp.id) {
                return Err(ConfigError::InvalidExperimentId(exp.id.clone()));
            }
            if !seen.insert(exp.id.as_str()) {
                return Err(ConfigError::DuplicateExperiment(exp.id.clone()));
            }
            for kind in PhaseKind::ALL {
                let Some(cfg) = exp.phase(kind) else {
                    continue;
                };
                if cfg.expect_failure && !kind.supports_expect_failure() {
                    return Err(ConfigError::ExpectFailureNotSupported {
                        id: exp.id.clone(),
                        phase: kind.to_string(),
                    });
                }
                if cfg.layout.is_some() && kind != PhaseKind::Lowering {
                    return Err(ConfigError::LayoutNotSupported {
                        id: exp.id.clone(),
                        phase: kind.to_string(),
                    });
                }
            }
        }
        Ok(Self { experiments })
    }

    /// The built-in catalogue.
    pub fn builtin() -> Self {
        Self {
            experiments: builtin_catalogue(),
        }
    }

    pub fn experiments(&self) -> &[Experiment] {
        &self.experiments
    }

    pub fn get(&self, id: &str) -> Option<&Experiment> {
        self.experiments.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Apply an optional inclusion filter. `None` selects everything.
    pub fn select(&self, only: Option<&BTreeSet<String>>) -> Selection<'_> {
        let Some(wanted) = only else {
            return Selection {
                experiments: self.experiments.iter().collect(),
                unknown: Vec::new(),
            };
        };

        let experiments: Vec<&Experiment> = self
            .experiments
            .iter()
            .filter(|e| wanted.contains(&e.id))
            .collect();
        let unknown = wanted
            .iter()
            .filter(|id| self.get(id).is_none())
            .cloned()
            .collect();

        Selection {
            experiments,
            unknown,
        }
    }
}

/// Parse a comma-separated id list, ignoring blanks and surrounding whitespace.
pub fn parse_id_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turn an optional `--only` value into an inclusion filter.
///
/// An absent value, or one naming no ids at all, selects the whole catalogue.
pub fn id_filter(raw: Option<&str>) -> Option<BTreeSet<String>> {
    raw.map(parse_id_list).filter(|ids| !ids.is_empty())
}

const NEW_TEST_TAG: &str = "new-test-tag";
const NEW_TEST_TAG_Y: &str = "new-test-tag-y";
const NN_EXTRA: &str = "eqsat-nn-extra-sync";

/// The authoritative experiment table.
pub fn builtin_catalogue() -> Vec<Experiment> {
    vec![
        Experiment::new(
            "1-vgg",
            "1. VGG",
            Some(PhaseConfig::new(NEW_TEST_TAG, "src/test/eqsat/nn/SingleVGGTest.scala")),
            Some(PhaseConfig::new(
                NEW_TEST_TAG,
                "src/test/algo/vgg8bits/VggFullBiasTest.scala",
            )),
        ),
        Experiment::new(
            "3-tinyyolo",
            "3. TinyYolo",
            Some(PhaseConfig::new(NEW_TEST_TAG, "src/test/eqsat/nn/SingleYoloTest.scala")),
            Some(PhaseConfig::new(
                NEW_TEST_TAG_Y,
                "src/test/backend/hdl/arch/yolo/ShallowConvFullTest.scala",
            )),
        ),
        Experiment::new(
            "6-self-attention",
            "6. Self-attention",
            Some(PhaseConfig::new(
                NN_EXTRA,
                "src/test/eqsat/nnExtra/SelfAttentionTest.scala",
            )),
            Some(PhaseConfig::new(
                NN_EXTRA,
                "src/test/eqsat/nnExtra/SelfAttentionLoweringTest.scala",
            )),
        ),
        Experiment::new(
            "10-stencil-4stage",
            "10. 4-stage stencil",
            Some(PhaseConfig::new(NN_EXTRA, "src/test/eqsat/nnExtra/StencilTest.scala")),
            Some(PhaseConfig::new(
                NN_EXTRA,
                "src/test/eqsat/nnExtra/StencilLoweringTest.scala",
            )),
        ),
        Experiment::new(
            "11-stencil-baseline",
            "11. 4-stage stencil baseline",
            None,
            Some(PhaseConfig::new(
                NN_EXTRA,
                "src/test/eqsat/nnExtra/StencilNoSharingTest.scala",
            )),
        ),
        Experiment::new(
            "12-vgg-no-sharing",
            "12. VGG, no sharing",
            Some(PhaseConfig::expecting_failure(
                NEW_TEST_TAG,
                "src/test/eqsat/nn/SingleVGGNoSharingTest.scala",
            )),
            None,
        ),
        Experiment::new(
            "13-vgg-no-padding",
            "13. VGG, no padding",
            Some(PhaseConfig::expecting_failure(
                NEW_TEST_TAG,
                "src/test/eqsat/nn/SingleVggNoPaddingTest.scala",
            )),
            None,
        ),
        Experiment::new(
            "14-vgg-no-tiling",
            "14. VGG, no tiling",
            Some(PhaseConfig::expecting_failure(
                NEW_TEST_TAG,
                "src/test/eqsat/nn/SingleVGGNoTilingTest.scala",
            )),
            None,
        ),
        Experiment::new(
            "15-vgg-baseline-no-sharing",
            "15. VGG, baseline, no sharing",
            None,
            Some(PhaseConfig::new(
                NN_EXTRA,
                "src/test/eqsat/nnExtra/VGGLoweringTest.scala",
            )),
        ),
        Experiment::new(
            "16-vgg-skeleshare-1abstr",
            "16. VGG, SkeleShare, 1 abstr",
            Some(PhaseConfig::new(
                NEW_TEST_TAG,
                "src/test/eqsat/nn/SingleVGGHalfAbsTest.scala",
            )),
            Some(PhaseConfig::new(
                NEW_TEST_TAG,
                "src/test/eqsat/nn/VggConvHalfAbsTest.scala",
            )),
        ),
        Experiment::new(
            "17-vgg-quarter-dsps",
            "17. VGG, 1/4 DSPs",
            Some(PhaseConfig::new(
                NEW_TEST_TAG,
                "src/test/eqsat/nn/SingleVGGFourthDSPTest.scala",
            )),
            Some(PhaseConfig::new(
                NEW_TEST_TAG,
                "src/test/algo/vgg8bits/VggConvFourthDSPTest.scala",
            )),
        ),
        Experiment::new(
            "19-vgg-half-dsps",
            "19. VGG, 1/2 DSPs",
            Some(PhaseConfig::new(
                NEW_TEST_TAG,
                "src/test/eqsat/nn/SingleVGGHalfDSPTest.scala",
            )),
            Some(PhaseConfig::new(
                NEW_TEST_TAG,
                "src/test/algo/vgg8bits/VggConvHalfDSPTest.scala",
            )),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::LoweringLayout;

    fn ids(selection: &Selection<'_>) -> Vec<String> {
        selection.experiments.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_builtin_catalogue_is_valid() {
        let builtin = builtin_catalogue();
        let catalogue = Catalogue::new(builtin.clone()).unwrap();
        assert_eq!(catalogue.len(), 12);
        assert_eq!(catalogue, Catalogue::builtin());
    }

    #[test]
    fn test_builtin_catalogue_order() {
        let catalogue = Catalogue::builtin();
        let first = &catalogue.experiments()[0];
        let last = &catalogue.experiments()[catalogue.len() - 1];
        assert_eq!(first.id, "1-vgg");
        assert_eq!(last.id, "19-vgg-half-dsps");
    }

    #[test]
    fn test_builtin_expected_failures_are_discovery_only() {
        let catalogue = Catalogue::builtin();
        let failing: Vec<&str> = catalogue
            .experiments()
            .iter()
            .filter(|e| e.discovery.as_ref().is_some_and(|d| d.expect_failure))
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(
            failing,
            vec!["12-vgg-no-sharing", "13-vgg-no-padding", "14-vgg-no-tiling"]
        );
        for exp in catalogue.experiments() {
            if exp.discovery.as_ref().is_some_and(|d| d.expect_failure) {
                assert!(exp.lowering.is_none());
            }
        }
    }

    #[test]
    fn test_select_without_filter_returns_all_in_order() {
        let catalogue = Catalogue::builtin();
        let selection = catalogue.select(None);
        assert_eq!(selection.experiments.len(), catalogue.len());
        assert!(selection.unknown.is_empty());
    }

    #[test]
    fn test_select_preserves_catalogue_order() {
        let catalogue = Catalogue::builtin();
        let wanted = parse_id_list("19-vgg-half-dsps,1-vgg,11-stencil-baseline");
        let selection = catalogue.select(Some(&wanted));
        assert_eq!(
            ids(&selection),
            vec!["1-vgg", "11-stencil-baseline", "19-vgg-half-dsps"]
        );
    }

    #[test]
    fn test_select_reports_unknown_ids() {
        let catalogue = Catalogue::new(vec![Experiment::new("X", "x", None, None)]).unwrap();
        let wanted = parse_id_list("X,Y");
        let selection = catalogue.select(Some(&wanted));
        assert_eq!(ids(&selection), vec!["X"]);
        assert_eq!(selection.unknown, vec!["Y".to_string()]);
    }

    #[test]
    fn test_parse_id_list_trims_and_drops_blanks() {
        let parsed = parse_id_list(" 1-vgg, ,3-tinyyolo,,");
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains("1-vgg"));
        assert!(parsed.contains("3-tinyyolo"));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let result = Catalogue::new(vec![
            Experiment::new("a", "A", None, None),
            Experiment::new("a", "A again", None, None),
        ]);
        assert!(matches!(result, Err(ConfigError::DuplicateExperiment(id)) if id == "a"));
    }

    #[test]
    fn test_rejects_empty_id() {
        let result = Catalogue::new(vec![Experiment::new(" ", "blank", None, None)]);
        assert!(matches!(result, Err(ConfigError::EmptyExperimentId(0))));
    }

    #[test]
    fn test_rejects_ids_outside_results_tree() {
        for bad in ["..", "a/../b", "/x", "../precious", "nested/id"] {
            let result = Catalogue::new(vec![Experiment::new(
                bad,
                "escapes",
                None,
                Some(PhaseConfig::new("main", "src/test/Low.scala")),
            )]);
            assert!(
                matches!(result, Err(ConfigError::InvalidExperimentId(ref id)) if id == bad),
                "accepted {:?}",
                bad
            );
        }
        let result = Catalogue::new(vec![Experiment::new("", "blank", None, None)]);
        assert!(matches!(result, Err(ConfigError::EmptyExperimentId(0))));
    }

    #[test]
    fn test_empty_id_filter_selects_everything() {
        assert_eq!(id_filter(None), None);
        assert_eq!(id_filter(Some("")), None);
        assert_eq!(id_filter(Some(" , ,")), None);
        let ids = id_filter(Some("1-vgg,")).unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["1-vgg".to_string()]);

        let catalogue = Catalogue::builtin();
        let selection = catalogue.select(id_filter(Some("")).as_ref());
        assert_eq!(selection.experiments.len(), catalogue.len());
        assert!(selection.unknown.is_empty());
    }

    #[test]
    fn test_builtin_ids_are_plain_names() {
        assert!(Catalogue::new(builtin_catalogue()).is_ok());
    }

    #[test]
    fn test_rejects_expect_failure_on_lowering() {
        let result = Catalogue::new(vec![Experiment::new(
            "a",
            "A",
            None,
            Some(PhaseConfig::expecting_failure("b", "p")),
        )]);
        assert!(matches!(
            result,
            Err(ConfigError::ExpectFailureNotSupported { .. })
        ));
    }

    #[test]
    fn test_rejects_layout_outside_lowering() {
        let result = Catalogue::new(vec![Experiment::new(
            "a",
            "A",
            Some(PhaseConfig::new("b", "p").with_layout(LoweringLayout::SingleSubdirectory)),
            None,
        )]);
        assert!(matches!(result, Err(ConfigError::LayoutNotSupported { .. })));
    }
}
