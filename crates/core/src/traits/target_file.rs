//! Target file traits.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

/// A file handed over by the host framework for transformation.
///
/// Borrowed for the duration of one transformation; no write primitive is
/// needed because content is rewritten inside the sandbox's bind mount.
#[async_trait]
pub trait TargetFile: Send + Sync {
    /// Root directory of the tree the file belongs to.
    fn root_path(&self) -> &Path;

    /// Host path of the file itself.
    fn path(&self) -> &Path;

    /// Read the file's current textual content.
    async fn read_text(&self) -> Result<String>;
}
