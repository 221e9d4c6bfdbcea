//! Per-ecosystem analyzer trait

use super::types::{DetectionResult, Strategy};
use crate::fs::FileSystem;
use anyhow::Result;
use std::path::Path;

/// One ecosystem's answer to "is this repository mine?"
///
/// Implementations check their marker files first and return `Ok(None)`
/// without error when none is present. Secondary-signal failures are
/// recorded as warnings on the result; only a failure to read the primary
/// manifest is returned as `Err`.
pub trait EcosystemAnalyzer: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Files whose presence at the repository root claims the ecosystem
    fn marker_files(&self) -> &'static [&'static str];

    fn matches(&self, repo: &Path, fs: &dyn FileSystem) -> bool {
        self.marker_files()
            .iter()
            .any(|marker| fs.is_file(&repo.join(marker)))
    }

    fn analyze(&self, repo: &Path, fs: &dyn FileSystem) -> Result<Option<DetectionResult>>;
}

/// Reads an optional file, treating absence and read errors alike
pub(crate) fn read_optional(fs: &dyn FileSystem, path: &Path) -> Option<String> {
    if fs.is_file(path) {
        fs.read_lossy(path).ok()
    } else {
        None
    }
}
