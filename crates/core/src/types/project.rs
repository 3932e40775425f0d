use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

// =============================================================================
// Project Root
// =============================================================================

/// Top-level directory of the tree being transformed.
///
/// Always holds a canonical absolute host path, so two roots reached through
/// different spellings (relative paths, symlinks, `..`) compare equal and
/// share one memoization key.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProjectRoot(PathBuf);

impl ProjectRoot {
    /// Canonicalize `path` into a project root. The directory must exist.
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let canonical = std::fs::canonicalize(path).map_err(|e| {
            Error::invalid_target(format!(
                "Cannot resolve project root {}: {}",
                path.display(),
                e
            ))
        })?;

        if !canonical.is_dir() {
            return Err(Error::invalid_target(format!(
                "Project root {} is not a directory",
                canonical.display()
            )));
        }

        Ok(Self(canonical))
    }

    /// The canonical host path.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Memoization key: the canonical path as a string.
    pub fn key(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }

    /// Join a relative path onto the root.
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.0.join(relative)
    }
}

impl std::fmt::Display for ProjectRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_canonicalizes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();

        let direct = ProjectRoot::resolve(dir.path()).unwrap();
        let roundabout = ProjectRoot::resolve(dir.path().join("lib").join("..")).unwrap();

        assert_eq!(direct, roundabout);
        assert_eq!(direct.key(), roundabout.key());
        assert!(direct.path().is_absolute());
    }

    #[test]
    fn test_resolve_rejects_missing_and_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProjectRoot::resolve(dir.path().join("missing")).is_err());

        let file = dir.path().join("pubspec.yaml");
        std::fs::write(&file, "name: demo\n").unwrap();
        assert!(ProjectRoot::resolve(&file).is_err());
    }
}
