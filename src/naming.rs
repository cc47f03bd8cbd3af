//! Mapping from catalogue identifiers to the names the outside world expects.
//!
//! Test sources are declared by path (`src/test/eqsat/nn/SingleVGGTest.scala`); the
//! build tool wants the dotted class name (`eqsat.nn.SingleVGGTest`). Branches are
//! declared by name and live at `<workspace>/<prefix><branch>`.

use std::path::{Component, Path, PathBuf};

/// Source-root prefixes stripped from a test path, longest first.
const TEST_ROOT_PREFIXES: &[&str] = &["src/test/scala/", "src/test/"];

/// Extension stripped from a test path.
const TEST_SOURCE_EXTENSION: &str = ".scala";

/// Placeholder replaced by the invocation name in a target template.
pub const TARGET_PLACEHOLDER: &str = "{target}";

/// Derive the fully-qualified test name from a slash-separated source path.
///
/// ```
/// use harvest::naming::invocation_name;
/// assert_eq!(
///     invocation_name("src/test/backend/hdl/arch/yolo/ShallowConvFullTest.scala"),
///     "backend.hdl.arch.yolo.ShallowConvFullTest"
/// );
/// ```
pub fn invocation_name(test_path: &str) -> String {
    let mut path = test_path;
    if let Some(stripped) = TEST_ROOT_PREFIXES
        .iter()
        .find_map(|prefix| path.strip_prefix(prefix))
    {
        path = stripped;
    }
    let path = path.strip_suffix(TEST_SOURCE_EXTENSION).unwrap_or(path);
    path.replace('/', ".")
}

/// Location of the checkout for `branch`.
pub fn checkout_dir(workspace: &Path, prefix: &str, branch: &str) -> PathBuf {
    workspace.join(format!("{}{}", prefix, branch))
}

/// Substitute the invocation name into a target template.
///
/// A template without a placeholder is treated as a prefix, so `"testOnly"` and
/// `"testOnly {target}"` render the same way.
pub fn render_target(template: &str, name: &str) -> String {
    if template.contains(TARGET_PLACEHOLDER) {
        template.replace(TARGET_PLACEHOLDER, name)
    } else if template.trim().is_empty() {
        name.to_string()
    } else {
        format!("{} {}", template.trim_end(), name)
    }
}

/// Whether `path` is a non-empty relative path made only of plain names.
///
/// Rejects the root, `.` and `..`, so joining the result onto a directory stays inside it.
pub fn is_plain_relative(path: &str) -> bool {
    !path.trim().is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Whether `name` is a single plain path component.
pub fn is_plain_name(name: &str) -> bool {
    is_plain_relative(name) && Path::new(name).components().count() == 1
}
