//! Shell command execution inside the sandbox.
//!
//! Every toolchain command goes through [`SandboxCommandRunner`]; callers
//! never talk to the [`SandboxEngine`] directly.

use std::sync::Arc;

use filestate_flutter_core::config::SandboxSettings;
use filestate_flutter_core::{Error, ProjectRoot, Result};

use crate::container_path::shell_quote;
use crate::engine::{SandboxEngine, SandboxId, SandboxSpec};

/// Runs shell commands from the project root inside the sandbox.
pub struct SandboxCommandRunner {
    engine: Arc<dyn SandboxEngine>,
    spec: SandboxSpec,
    toolchain_paths: Vec<String>,
}

impl SandboxCommandRunner {
    pub fn new(engine: Arc<dyn SandboxEngine>, spec: SandboxSpec, toolchain_paths: Vec<String>) -> Self {
        Self {
            engine,
            spec,
            toolchain_paths,
        }
    }

    pub fn from_settings(engine: Arc<dyn SandboxEngine>, settings: &SandboxSettings) -> Self {
        Self::new(
            engine,
            SandboxSpec::from_settings(settings),
            settings.toolchain_paths.clone(),
        )
    }

    pub fn spec(&self) -> &SandboxSpec {
        &self.spec
    }

    /// Extend `PATH` with the toolchain directories and enter the mount point.
    pub fn preamble(&self) -> String {
        let mut parts = Vec::new();
        if !self.toolchain_paths.is_empty() {
            parts.push(format!(
                "export PATH={}:$PATH",
                self.toolchain_paths
                    .iter()
                    .map(|p| shell_quote(p))
                    .collect::<Vec<_>>()
                    .join(":")
            ));
        }
        parts.push(format!("cd {}", shell_quote(&self.spec.mount_point)));
        parts.join(" && ")
    }

    /// The argv executed in the sandbox for `shell_command`.
    pub fn command_line(&self, shell_command: &str) -> Vec<String> {
        vec![
            "bash".to_string(),
            "-lc".to_string(),
            format!("{} && {}", self.preamble(), shell_command),
        ]
    }

    /// Ensure the sandbox for `root` is running. Idempotent.
    pub async fn ensure_running(&self, root: &ProjectRoot) -> Result<SandboxId> {
        self.engine.ensure_running(&self.spec, root).await
    }

    /// Run `shell_command` from the project root and return its stdout.
    pub async fn run(&self, root: &ProjectRoot, shell_command: &str) -> Result<String> {
        let id = self.ensure_running(root).await.map_err(|e| Error::SandboxExecution {
            command: shell_command.to_string(),
            exit_code: None,
            output: e.to_string(),
        })?;
        self.run_in(&id, shell_command).await
    }

    /// Run `shell_command` in an already running sandbox.
    pub async fn run_in(&self, id: &SandboxId, shell_command: &str) -> Result<String> {
        tracing::debug!(sandbox = %id, command = %shell_command, "Running sandbox command");

        let result = self
            .engine
            .exec(id, &self.command_line(shell_command), self.spec.exec_timeout)
            .await
            .map_err(|e| Error::SandboxExecution {
                command: shell_command.to_string(),
                exit_code: None,
                output: e.to_string(),
            })?;

        if result.timed_out {
            return Err(Error::SandboxExecution {
                command: shell_command.to_string(),
                exit_code: None,
                output: result.combined_output(),
            });
        }

        if !result.success() {
            tracing::warn!(sandbox = %id, command = %shell_command, exit_code = result.exit_code, "Sandbox command failed");
            return Err(Error::SandboxExecution {
                command: shell_command.to_string(),
                exit_code: Some(result.exit_code),
                output: result.combined_output(),
            });
        }

        Ok(result.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ExecResult, MockSandbox};

    fn runner(mock: Arc<MockSandbox>) -> SandboxCommandRunner {
        SandboxCommandRunner::from_settings(mock, &SandboxSettings::default())
    }

    #[test]
    fn test_command_line_preamble() {
        let runner = runner(Arc::new(MockSandbox::new()));
        assert_eq!(
            runner.command_line("dart --version"),
            vec![
                "bash".to_string(),
                "-lc".to_string(),
                "export PATH=/usr/local/flutter/bin:/usr/lib/dart/bin:/sdks/flutter/bin:$PATH \
                 && cd /var/www/html && dart --version"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_preamble_without_toolchain_paths() {
        let runner = SandboxCommandRunner::new(
            Arc::new(MockSandbox::new()),
            SandboxSpec::default(),
            Vec::new(),
        );
        assert_eq!(runner.preamble(), "cd /var/www/html");
    }

    #[tokio::test]
    async fn test_run_returns_stdout_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let root = ProjectRoot::resolve(dir.path()).unwrap();
        let mock = Arc::new(MockSandbox::new().respond_to("dart --version", ExecResult::ok("Dart SDK 3.5.0\n")));

        let out = runner(mock.clone()).run(&root, "dart --version").await.unwrap();
        assert_eq!(out, "Dart SDK 3.5.0\n");
        assert_eq!(mock.ensure_running_count(), 1);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = ProjectRoot::resolve(dir.path()).unwrap();
        let mock = Arc::new(MockSandbox::new().respond_to("dart analyze", ExecResult::failed(3, "1 issue found")));

        let err = runner(mock).run(&root, "dart analyze").await.unwrap_err();
        match err {
            Error::SandboxExecution {
                command,
                exit_code,
                output,
            } => {
                assert_eq!(command, "dart analyze");
                assert_eq!(exit_code, Some(3));
                assert_eq!(output, "1 issue found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = ProjectRoot::resolve(dir.path()).unwrap();
        let timed_out = ExecResult {
            exit_code: -1,
            stderr: "[Execution timed out after 5s]".into(),
            timed_out: true,
            ..Default::default()
        };
        let mock = Arc::new(MockSandbox::new().respond_to("sleep", timed_out));

        let err = runner(mock).run(&root, "sleep 999").await.unwrap_err();
        assert!(matches!(err, Error::SandboxExecution { exit_code: None, .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_unreachable_sandbox_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = ProjectRoot::resolve(dir.path()).unwrap();
        let mock = Arc::new(MockSandbox::new().fail_ensure_running(1));

        let err = runner(mock.clone()).run(&root, "dart --version").await.unwrap_err();
        assert!(matches!(err, Error::SandboxExecution { exit_code: None, .. }));
        assert!(mock.scripts().is_empty());
    }
}
