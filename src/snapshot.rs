//! Before/after filesystem snapshots.
//!
//! The build tool does not report what it wrote, and its output naming differs from
//! branch to branch, so the only branch-agnostic way to find its artifacts is to walk
//! the checkout before and after the run and take the difference.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into: VCS metadata and build-tool caches.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[".git", "target", "project", ".idea", ".bsp", ".metals"];

/// Relative paths of every file under a root at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: BTreeSet<PathBuf>,
}

impl Snapshot {
    /// Walk `root` and record every regular file, pruning directories named in `excluded`.
    ///
    /// Symlinks are recorded when they resolve to a regular file; directory symlinks are
    /// not followed.
    pub fn capture<S: AsRef<str>>(root: &Path, excluded: &[S]) -> Result<Self> {
        let mut files = BTreeSet::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_excluded(entry, excluded));

        for entry in walker {
            let entry =
                entry.with_context(|| format!("Failed to walk directory: {}", root.display()))?;
            if !is_file(&entry) {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .with_context(|| format!("{} is not under {}", entry.path().display(), root.display()))?;
            files.insert(rel.to_path_buf());
        }

        Ok(Self { files })
    }

    /// Paths present in `self` but not in `before`.
    pub fn added_since(&self, before: &Snapshot) -> BTreeSet<PathBuf> {
        self.files.difference(&before.files).cloned().collect()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files.contains(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter()
    }
}

impl FromIterator<PathBuf> for Snapshot {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Files present in `after` but not in `before`.
pub fn diff(before: &Snapshot, after: &Snapshot) -> BTreeSet<PathBuf> {
    after.added_since(before)
}

fn is_excluded<S: AsRef<str>>(entry: &DirEntry, excluded: &[S]) -> bool {
    // The root itself is never pruned, whatever it is called.
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    excluded.iter().any(|dir| dir.as_ref() == name)
}

fn is_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}
