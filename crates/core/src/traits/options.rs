//! File content option traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::traits::TargetFile;

/// An option that computes the new content of a target file.
#[async_trait]
pub trait FileContentOption: Send + Sync {
    /// Get the unique name of the option.
    fn name(&self) -> &str;

    /// Get the human-readable description.
    fn description(&self) -> &str;

    /// Compute the new content for `target`.
    ///
    /// Must fail rather than return stale content when any step fails.
    async fn apply(&self, target: &dyn TargetFile) -> Result<String>;
}
