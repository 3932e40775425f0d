use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::project::ProjectRoot;
use crate::error::{Error, Result};
use crate::traits::TargetFile;

// =============================================================================
// Local Target File
// =============================================================================

/// A target file on the local filesystem, addressed relative to its root.
#[derive(Debug, Clone)]
pub struct LocalTargetFile {
    root: ProjectRoot,
    path: PathBuf,
}

impl LocalTargetFile {
    /// Create a target for `path` inside `root`.
    ///
    /// Both are canonicalized; the file must exist and live under the root.
    pub fn new(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<Self> {
        let root = ProjectRoot::resolve(root)?;
        let path = std::fs::canonicalize(path.as_ref()).map_err(|e| {
            Error::invalid_target(format!(
                "Cannot resolve target file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        if !path.starts_with(root.path()) {
            return Err(Error::PathOutsideRoot {
                path: path.display().to_string(),
                root: root.key(),
            });
        }

        Ok(Self { root, path })
    }

    /// The resolved project root of this target.
    pub fn project_root(&self) -> &ProjectRoot {
        &self.root
    }
}

#[async_trait]
impl TargetFile for LocalTargetFile {
    fn root_path(&self) -> &Path {
        self.root.path()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn read_text(&self) -> Result<String> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_target_reads_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        let file = dir.path().join("lib").join("main.dart");
        std::fs::write(&file, "void main() {}\n").unwrap();

        let target = LocalTargetFile::new(dir.path(), &file).unwrap();
        assert_eq!(target.read_text().await.unwrap(), "void main() {}\n");
        assert!(target.path().starts_with(target.root_path()));
    }

    #[test]
    fn test_local_target_outside_root() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let file = elsewhere.path().join("main.dart");
        std::fs::write(&file, "").unwrap();

        let err = LocalTargetFile::new(root.path(), &file).unwrap_err();
        assert!(matches!(err, Error::PathOutsideRoot { .. }));
    }
}
