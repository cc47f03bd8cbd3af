//! Relocating artifacts into the results tree.
//!
//! Every copy preserves the relative layout under its source root and carries over
//! permissions and modification time. Destinations are always cleared before they are
//! written, so a results directory only ever holds the output of the latest run.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Copy a single file, carrying over permissions and modification time.
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    // fs::copy also carries over the permission bits.
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;

    let modified = fs::metadata(src)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("Failed to read metadata: {}", src.display()))?;
    // Read-only handle: the copied permissions may forbid writing, and owners can set
    // explicit timestamps without write access.
    let file = fs::File::open(dst)
        .with_context(|| format!("Failed to open {} to set its mtime", dst.display()))?;
    file.set_modified(modified)
        .with_context(|| format!("Failed to set mtime on {}", dst.display()))?;
    Ok(())
}

/// Copy each of `rel_paths` from `src_root` to the same relative location under `dst_root`.
///
/// Returns the number of files copied.
pub fn copy_relative_paths(
    src_root: &Path,
    rel_paths: &BTreeSet<PathBuf>,
    dst_root: &Path,
) -> Result<usize> {
    for rel in rel_paths {
        copy_file_with_metadata(&src_root.join(rel), &dst_root.join(rel))?;
    }
    Ok(rel_paths.len())
}

/// Recursively copy the contents of `src` into `dst`, creating `dst` if needed.
///
/// Symlinks are followed; the copy holds regular files only. Returns the number of
/// files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create directory: {}", dst.display()))?;

    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(true).min_depth(1) {
        let entry = entry.with_context(|| format!("Failed to walk directory: {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("{} is not under {}", entry.path().display(), src.display()))?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target.display()))?;
        } else {
            copy_file_with_metadata(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Delete `dir` and everything below it if it exists.
///
/// Returns whether anything was removed.
pub fn remove_dir_if_exists(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(dir)
        .with_context(|| format!("Failed to remove directory: {}", dir.display()))?;
    Ok(true)
}

/// Names of the immediate subdirectories of `dir`, sorted.
pub fn immediate_subdirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry.with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
