//! Destination-path deduplication

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Destination paths currently owned by a live task
///
/// Paths are compared exactly; callers normalize them first.
#[derive(Debug, Default)]
pub(crate) struct DuplicateGuard {
    paths: HashSet<PathBuf>,
}

impl DuplicateGuard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `path`; false if it was already reserved
    pub(crate) fn reserve(&mut self, path: &Path) -> bool {
        self.paths.insert(path.to_path_buf())
    }

    /// Drop `path`; releasing an unknown path is a no-op
    pub(crate) fn release(&mut self, path: &Path) {
        self.paths.remove(path);
    }

    pub(crate) fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub(crate) fn len(&self) -> usize {
        self.paths.len()
    }
}
