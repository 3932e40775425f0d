//! Transformation session manager.
//!
//! Bundles the command runner and the environment preparer that share one
//! engine and one prepared-root registry. Content options hold an
//! `Arc<SandboxSession>` and never reach the engine directly.

use std::path::Path;
use std::sync::Arc;

use filestate_flutter_core::config::AppConfig;
use filestate_flutter_core::{ProjectRoot, Result, TargetFile};

use crate::container_path::container_path;
use crate::engine::SandboxEngine;
use crate::preparer::{PreparedRootRegistry, SandboxEnvironmentPreparer};
use crate::runner::SandboxCommandRunner;

pub struct SandboxSession {
    runner: Arc<SandboxCommandRunner>,
    preparer: SandboxEnvironmentPreparer,
}

impl SandboxSession {
    pub fn new(runner: Arc<SandboxCommandRunner>, preparer: SandboxEnvironmentPreparer) -> Self {
        Self { runner, preparer }
    }

    /// Build a session with a fresh registry from the application config.
    pub fn from_config(engine: Arc<dyn SandboxEngine>, config: &AppConfig) -> Self {
        let runner = Arc::new(SandboxCommandRunner::from_settings(engine, &config.sandbox));
        let preparer =
            SandboxEnvironmentPreparer::new(runner.clone(), Arc::new(PreparedRootRegistry::new()))
                .with_failure_cooldown(config.preparation.failure_cooldown());
        Self::new(runner, preparer)
    }

    pub fn runner(&self) -> &SandboxCommandRunner {
        &self.runner
    }

    pub fn registry(&self) -> &Arc<PreparedRootRegistry> {
        self.preparer.registry()
    }

    /// Resolve the project root of `target`.
    pub fn project_root(&self, target: &dyn TargetFile) -> Result<ProjectRoot> {
        ProjectRoot::resolve(target.root_path())
    }

    /// Prepare the sandbox for `root` (memoized).
    pub async fn prepare(&self, root: &ProjectRoot) -> Result<()> {
        self.preparer.prepare(root).await
    }

    /// Run `shell_command` from the project root inside the sandbox.
    pub async fn run(&self, root: &ProjectRoot, shell_command: &str) -> Result<String> {
        self.runner.run(root, shell_command).await
    }

    /// Path of `host_path` inside the sandbox.
    pub fn container_path(&self, root: &ProjectRoot, host_path: &Path) -> Result<String> {
        container_path(root, host_path, &self.runner.spec().mount_point)
    }

    /// Path of `target` inside the sandbox.
    ///
    /// The target may spell its path through the root it was given rather
    /// than through the canonical root, and both may be relative to the
    /// working directory. A relative path that does not start with the
    /// given root is taken as relative to the root itself.
    pub fn target_container_path(&self, root: &ProjectRoot, target: &dyn TargetFile) -> Result<String> {
        let host_path = target.path();
        if host_path.starts_with(root.path()) {
            return self.container_path(root, host_path);
        }
        if let Ok(relative) = host_path.strip_prefix(target.root_path()) {
            return self.container_path(root, relative);
        }
        if !host_path.is_absolute() {
            return self.container_path(root, host_path);
        }
        self.container_path(root, &std::fs::canonicalize(host_path)?)
    }
}
