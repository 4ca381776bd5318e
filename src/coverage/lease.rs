//! Scoped access to a build tree's instrumentation counters
//!
//! The instrumented compiler accumulates counts in `.gcda` files that every
//! invocation against the same build shares. A lease zeroes them on acquire
//! and again on drop, whatever happened in between.

use crate::error::SflResult;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Exclusive, self-resetting view of a build tree's `.gcda` files
#[derive(Debug)]
pub struct InstrumentationLease {
    root: PathBuf,
}

impl InstrumentationLease {
    /// Remove every `.gcda` under `root` and hand out the lease
    pub fn acquire<P: AsRef<Path>>(root: P) -> SflResult<Self> {
        let root = root.as_ref().to_path_buf();
        let removed = remove_files_with_suffix(&root, ".gcda")?;
        tracing::debug!(root = %root.display(), removed, "reset instrumentation counters");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `.gcda` files written since the lease was acquired, sorted
    pub fn artifacts(&self) -> Vec<PathBuf> {
        files_with_suffix(&self.root, ".gcda")
    }
}

impl Drop for InstrumentationLease {
    fn drop(&mut self) {
        if let Err(e) = remove_files_with_suffix(&self.root, ".gcda") {
            tracing::warn!("Failed to reset counters under {}: {}", self.root.display(), e);
        }
    }
}

/// Files under `root` whose name ends with `suffix`, sorted
pub fn files_with_suffix(root: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(suffix))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Delete files under `root` whose name ends with `suffix`
pub fn remove_files_with_suffix(root: &Path, suffix: &str) -> SflResult<usize> {
    let files = files_with_suffix(root, suffix);
    for file in &files {
        match fs::remove_file(file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(files.len())
}
