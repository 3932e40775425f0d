//! Format-and-fix option for Dart/Flutter files.

use async_trait::async_trait;
use std::sync::Arc;

use filestate_flutter_core::{FileContentOption, Result, TargetFile};
use filestate_flutter_sandbox::{shell_quote, SandboxSession};

/// Formats and fixes Dart/Flutter code with `dart fix` then `dart format`,
/// both run inside the sandbox against the bind-mounted file.
///
/// Fix runs first: the fixer may emit code the formatter then normalizes,
/// while the reverse order could leave fixer output unformatted.
pub struct DartFormatOption {
    session: Arc<SandboxSession>,
}

impl DartFormatOption {
    pub const NAME: &'static str = "dart_format";

    pub fn new(session: Arc<SandboxSession>) -> Self {
        Self { session }
    }

    pub fn fix_command(container_path: &str) -> String {
        format!("dart fix --apply {}", shell_quote(container_path))
    }

    pub fn format_command(container_path: &str) -> String {
        format!("dart format {}", shell_quote(container_path))
    }
}

#[async_trait]
impl FileContentOption for DartFormatOption {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Format and fix Dart/Flutter code using dart format and dart fix."
    }

    async fn apply(&self, target: &dyn TargetFile) -> Result<String> {
        let root = self.session.project_root(target)?;
        self.session.prepare(&root).await?;

        let path = self.session.target_container_path(&root, target)?;
        tracing::debug!(root = %root, path = %path, "Formatting Dart file in sandbox");

        self.session.run(&root, &Self::fix_command(&path)).await?;
        self.session.run(&root, &Self::format_command(&path)).await?;

        // Both commands rewrote the file in place through the bind mount.
        target.read_text().await
    }
}
