//! Contract discovery strategies.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Strategy for finding a contract file by name.
pub trait ContractLocator: Send + Sync {
    /// Return the path of `file_name` if this strategy can find it.
    fn locate(&self, file_name: &str) -> Option<PathBuf>;
}

/// Walks from a start directory towards the filesystem root, probing
/// `<ancestor>/<relative_dir>/<file_name>` at each level.
#[derive(Debug, Clone)]
pub struct AncestorSearch {
    start: PathBuf,
    relative_dir: PathBuf,
    max_depth: usize,
}

impl AncestorSearch {
    /// Default number of levels walked.
    pub const DEFAULT_MAX_DEPTH: usize = 10;

    /// Search from `start` for files under `relative_dir`.
    #[must_use]
    pub fn new(start: impl Into<PathBuf>, relative_dir: impl Into<PathBuf>) -> Self {
        Self {
            start: start.into(),
            relative_dir: relative_dir.into(),
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit how many levels are walked, counting the start directory.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl ContractLocator for AncestorSearch {
    fn locate(&self, file_name: &str) -> Option<PathBuf> {
        self.start
            .ancestors()
            .take(self.max_depth)
            .map(|dir| dir.join(&self.relative_dir).join(file_name))
            .find(|candidate| {
                debug!(candidate = %candidate.display(), "Probing for contract");
                candidate.is_file()
            })
    }
}

/// Always resolves to one configured path, if it exists.
#[derive(Debug, Clone)]
pub struct FixedPath(pub PathBuf);

impl ContractLocator for FixedPath {
    fn locate(&self, _file_name: &str) -> Option<PathBuf> {
        self.0.is_file().then(|| self.0.clone())
    }
}

/// Try each locator in turn, falling back to `fallback` when none finds the file.
#[must_use]
pub fn locate_contract(
    locators: &[&dyn ContractLocator],
    file_name: &str,
    fallback: &Path,
) -> PathBuf {
    locators
        .iter()
        .find_map(|locator| locator.locate(file_name))
        .unwrap_or_else(|| fallback.to_path_buf())
}
