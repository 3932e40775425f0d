//! Host cache sanitation.
//!
//! Dart tooling caches record absolute host paths (e.g. the host's
//! `~/.pub-cache`). Inside the sandbox those paths do not exist, so the
//! caches are wiped before dependencies are resolved again in the container.

use std::path::Path;
use walkdir::WalkDir;

use filestate_flutter_core::ProjectRoot;

/// Dependency-tool cache directory under a project root.
pub const DART_TOOL_DIR: &str = ".dart_tool";
/// Legacy dependency manifest under a project root.
pub const LEGACY_PACKAGES_FILE: &str = ".packages";

/// Removes one filesystem entry; the flag is set for directories.
type RemoveEntry = fn(&Path, bool) -> std::io::Result<()>;

fn remove_entry(path: &Path, is_dir: bool) -> std::io::Result<()> {
    if is_dir {
        std::fs::remove_dir(path)
    } else {
        std::fs::remove_file(path)
    }
}

/// Removes host-generated dependency caches under a project root.
///
/// Removal is best effort: every entry is attempted, failures are logged and
/// skipped, and sanitation as a whole never fails.
#[derive(Debug, Clone)]
pub struct HostCacheSanitizer {
    cache_dirs: Vec<String>,
    cache_files: Vec<String>,
    remove: RemoveEntry,
}

impl Default for HostCacheSanitizer {
    fn default() -> Self {
        Self {
            cache_dirs: vec![DART_TOOL_DIR.to_string()],
            cache_files: vec![LEGACY_PACKAGES_FILE.to_string()],
            remove: remove_entry,
        }
    }
}

impl HostCacheSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_remover(mut self, remove: RemoveEntry) -> Self {
        self.remove = remove;
        self
    }

    /// Delete the cache artifacts under `root`. Idempotent.
    pub fn sanitize(&self, root: &ProjectRoot) {
        for dir in &self.cache_dirs {
            remove_tree_best_effort(&root.join(dir), self.remove);
        }
        for file in &self.cache_files {
            remove_file_best_effort(&root.join(file), self.remove);
        }
    }
}

fn remove_tree_best_effort(path: &Path, remove: RemoveEntry) {
    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        return;
    };
    if !metadata.is_dir() {
        remove_file_best_effort(path, remove);
        return;
    }

    let mut failures = 0usize;
    for entry in WalkDir::new(path).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                failures += 1;
                tracing::warn!(path = %path.display(), error = %e, "Cannot walk cache entry, skipping");
                continue;
            }
        };

        if let Err(e) = remove(entry.path(), entry.file_type().is_dir()) {
            failures += 1;
            tracing::warn!(path = %entry.path().display(), error = %e, "Cannot remove cache entry, skipping");
        }
    }

    if failures == 0 {
        tracing::debug!(path = %path.display(), "Removed host cache directory");
    } else {
        tracing::warn!(path = %path.display(), failures, "Host cache directory only partially removed");
    }
}

fn remove_file_best_effort(path: &Path, remove: RemoveEntry) {
    match remove(path, false) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed host cache file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot remove host cache file, skipping")
        }
    }
}
