//! Sandbox execution engine.
//!
//! This module provides the `SandboxEngine` trait (the container driver the
//! session manager talks to) and a Docker-based implementation using the
//! `bollard` crate. Containers are long-lived, one per project root, with the
//! root bind-mounted at a fixed mount point so that files rewritten inside
//! the container are immediately visible on the host.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use filestate_flutter_core::config::SandboxSettings;
use filestate_flutter_core::{Error, ProjectRoot, Result};

// =============================================================================
// Sandbox Types
// =============================================================================

/// Identifier of a running sandbox container.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SandboxId(pub String);

impl std::fmt::Display for SandboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Image definition and container layout shared by every project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSpec {
    /// Docker image name (default: "wex-flutter-option").
    pub image_name: String,
    /// Dockerfile used to build the image when it is missing locally.
    pub dockerfile_path: PathBuf,
    /// Where the project root is mounted inside the container.
    pub mount_point: String,
    /// Optional execution timeout. `None` blocks until the command exits.
    pub exec_timeout: Option<Duration>,
}

impl SandboxSpec {
    pub fn from_settings(settings: &SandboxSettings) -> Self {
        Self {
            image_name: settings.image_name.clone(),
            dockerfile_path: settings.dockerfile_path.clone(),
            mount_point: settings.mount_point.clone(),
            exec_timeout: settings.exec_timeout(),
        }
    }

    /// Deterministic container name for a project root.
    pub fn container_name(&self, root: &ProjectRoot) -> String {
        let digest = Sha256::digest(root.key().as_bytes());
        format!("{}-{}", self.image_name, &hex::encode(digest)[..12])
    }
}

impl Default for SandboxSpec {
    fn default() -> Self {
        Self::from_settings(&SandboxSettings::default())
    }
}

/// Result of executing a command in the sandbox.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecResult {
    /// Exit code of the command.
    pub exit_code: i64,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Whether the command timed out.
    pub timed_out: bool,
}

impl ExecResult {
    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// A failed result with the given exit code and stderr.
    pub fn failed(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    /// Whether the execution was successful (exit code 0, no timeout).
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Combined stdout and stderr, for diagnostics.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n--- stderr ---\n{}", self.stdout, self.stderr),
        }
    }
}

// =============================================================================
// Sandbox Engine Trait
// =============================================================================

/// Container driver used by the session manager.
///
/// The default implementation uses Docker containers via `bollard`.
#[async_trait]
pub trait SandboxEngine: Send + Sync {
    /// Make sure the sandbox for `root` exists and is running.
    ///
    /// Must be idempotent: calling it for an already running sandbox is a
    /// no-op that returns the same id.
    async fn ensure_running(&self, spec: &SandboxSpec, root: &ProjectRoot) -> Result<SandboxId>;

    /// Execute `command` (argv form) inside the sandbox and capture its output.
    async fn exec(
        &self,
        id: &SandboxId,
        command: &[String],
        timeout: Option<Duration>,
    ) -> Result<ExecResult>;

    /// Check if the sandbox backend is available (e.g., Docker daemon running).
    async fn is_available(&self) -> bool;
}

// =============================================================================
// Docker Sandbox Implementation
// =============================================================================

/// Docker-based sandbox engine using the `bollard` crate.
///
/// One container per project root, named after a hash of the canonical
/// root path. Missing images are built from the configured Dockerfile, stopped
/// containers are restarted and running ones are reused.
pub struct DockerSandbox {
    docker: bollard::Docker,
}

impl DockerSandbox {
    /// Create a new Docker sandbox engine connecting to the local Docker daemon.
    pub fn new() -> Result<Self> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            Error::driver(format!(
                "Failed to connect to Docker daemon: {}. Is Docker running?",
                e
            ))
        })?;
        Ok(Self { docker })
    }

    /// Create from an existing bollard Docker client.
    pub fn from_client(docker: bollard::Docker) -> Self {
        Self { docker }
    }

    async fn ensure_image(&self, spec: &SandboxSpec) -> Result<()> {
        if self.docker.inspect_image(&spec.image_name).await.is_ok() {
            return Ok(());
        }

        let dockerfile = &spec.dockerfile_path;
        if !dockerfile.is_file() {
            return Err(Error::driver(format!(
                "Image {} is missing and Dockerfile {} does not exist",
                spec.image_name,
                dockerfile.display()
            )));
        }
        let context = match dockerfile.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        tracing::info!(image = %spec.image_name, dockerfile = %dockerfile.display(), "Building sandbox image");

        let output = tokio::process::Command::new("docker")
            .args(["build", "-t", &spec.image_name, "-f"])
            .arg(dockerfile)
            .arg(&context)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::driver(format!("Failed to run docker build: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::driver(format!(
                "docker build failed for {}: {}",
                spec.image_name,
                stderr.trim()
            )));
        }

        Ok(())
    }

    async fn create_container(
        &self,
        spec: &SandboxSpec,
        root: &ProjectRoot,
        name: &str,
    ) -> Result<()> {
        use bollard::container::{Config, CreateContainerOptions};
        use bollard::models::HostConfig;

        let host_config = HostConfig {
            binds: Some(vec![format!("{}:{}", root.path().display(), spec.mount_point)]),
            ..Default::default()
        };

        let container_config = Config {
            image: Some(spec.image_name.clone()),
            working_dir: Some(spec.mount_point.clone()),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            host_config: Some(host_config),
            labels: Some(std::collections::HashMap::from([
                ("managed-by".to_string(), "filestate-flutter".to_string()),
                ("filestate.root".to_string(), root.key()),
            ])),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name,
            platform: None,
        };

        match self
            .docker
            .create_container(Some(options), container_config)
            .await
        {
            Ok(_) => Ok(()),
            // Another task created it in the meantime.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 409, ..
            }) => Ok(()),
            Err(e) => Err(Error::driver(format!(
                "Failed to create sandbox container {}: {}",
                name, e
            ))),
        }
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        match self.docker.start_container::<String>(name, None).await {
            // 304: already started
            Ok(())
            | Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(Error::driver(format!(
                "Failed to start sandbox container {}: {}",
                name, e
            ))),
        }
    }
}

#[async_trait]
impl SandboxEngine for DockerSandbox {
    async fn ensure_running(&self, spec: &SandboxSpec, root: &ProjectRoot) -> Result<SandboxId> {
        let name = spec.container_name(root);

        let inspect = self
            .docker
            .inspect_container(&name, None::<bollard::container::InspectContainerOptions>)
            .await;

        match inspect {
            Ok(info) => {
                let running = info
                    .state
                    .and_then(|state| state.running)
                    .unwrap_or(false);
                if running {
                    return Ok(SandboxId(name));
                }
                tracing::info!(container = %name, root = %root, "Restarting stopped sandbox container");
                self.start_container(&name).await?;
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                self.ensure_image(spec).await?;
                self.create_container(spec, root, &name).await?;
                self.start_container(&name).await?;
                tracing::info!(container = %name, root = %root, image = %spec.image_name, "Sandbox container created and started");
            }
            Err(e) => {
                return Err(Error::driver(format!(
                    "Failed to inspect sandbox container {}: {}",
                    name, e
                )));
            }
        }

        Ok(SandboxId(name))
    }

    async fn exec(
        &self,
        id: &SandboxId,
        command: &[String],
        timeout: Option<Duration>,
    ) -> Result<ExecResult> {
        use bollard::exec::{CreateExecOptions, StartExecResults};

        let exec_options = CreateExecOptions {
            cmd: Some(command.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(&id.0, exec_options)
            .await
            .map_err(|e| Error::driver(format!("Failed to create exec in sandbox: {}", e)))?;

        let start_result = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| Error::driver(format!("Failed to start exec in sandbox: {}", e)))?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached { mut output, .. } = start_result {
            use futures::StreamExt;

            let collect_future = async {
                while let Some(msg) = output.next().await {
                    match msg {
                        Ok(bollard::container::LogOutput::StdOut { message }) => {
                            stdout.push_str(&String::from_utf8_lossy(&message));
                        }
                        Ok(bollard::container::LogOutput::StdErr { message }) => {
                            stderr.push_str(&String::from_utf8_lossy(&message));
                        }
                        Ok(_) => {}
                        Err(e) => {
                            stderr.push_str(&format!("\n[sandbox error: {}]", e));
                            break;
                        }
                    }
                }
            };

            match timeout {
                Some(limit) => {
                    if tokio::time::timeout(limit, collect_future).await.is_err() {
                        tracing::warn!(sandbox = %id, "Sandbox exec timed out");
                        return Ok(ExecResult {
                            exit_code: -1,
                            stdout,
                            stderr: format!("{}\n[Execution timed out after {:?}]", stderr, limit),
                            timed_out: true,
                        });
                    }
                }
                None => collect_future.await,
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| Error::driver(format!("Failed to inspect exec result: {}", e)))?;

        Ok(ExecResult {
            exit_code: inspect.exit_code.unwrap_or(-1),
            stdout,
            stderr,
            timed_out: false,
        })
    }

    async fn is_available(&self) -> bool {
        self.docker.ping().await.is_ok()
    }
}

// =============================================================================
// Mock Sandbox (for testing without Docker)
// =============================================================================

/// A call observed by [`MockSandbox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxCall {
    EnsureRunning { root: String },
    /// `script` is the last argv element, i.e. the shell script for `bash -lc`.
    Exec { sandbox: String, script: String },
}

/// In-memory mock sandbox for unit testing.
///
/// Every exec succeeds with empty output unless a scripted response matches
/// (first unused response whose needle occurs in the script).
#[derive(Default)]
pub struct MockSandbox {
    responses: Mutex<Vec<(String, ExecResult)>>,
    calls: Mutex<Vec<SandboxCall>>,
    ensure_failures: AtomicUsize,
    exec_delay: Option<Duration>,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next exec whose script contains `needle` with `result`.
    pub fn respond_to(self, needle: impl Into<String>, result: ExecResult) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((needle.into(), result));
        self
    }

    /// Make the next `count` calls to `ensure_running` fail.
    pub fn fail_ensure_running(self, count: usize) -> Self {
        self.ensure_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Sleep this long inside every exec.
    pub fn with_exec_delay(mut self, delay: Duration) -> Self {
        self.exec_delay = Some(delay);
        self
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> Vec<SandboxCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Scripts of all exec calls, in order.
    pub fn scripts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SandboxCall::Exec { script, .. } => Some(script),
                SandboxCall::EnsureRunning { .. } => None,
            })
            .collect()
    }

    /// Number of exec scripts containing `needle`.
    pub fn count_scripts_containing(&self, needle: &str) -> usize {
        self.scripts().iter().filter(|s| s.contains(needle)).count()
    }

    pub fn ensure_running_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SandboxCall::EnsureRunning { .. }))
            .count()
    }
}

#[async_trait]
impl SandboxEngine for MockSandbox {
    async fn ensure_running(&self, spec: &SandboxSpec, root: &ProjectRoot) -> Result<SandboxId> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SandboxCall::EnsureRunning { root: root.key() });

        let should_fail = self
            .ensure_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(Error::driver("mock sandbox refused to start"));
        }

        Ok(SandboxId(spec.container_name(root)))
    }

    async fn exec(
        &self,
        id: &SandboxId,
        command: &[String],
        _timeout: Option<Duration>,
    ) -> Result<ExecResult> {
        let script = command.last().cloned().unwrap_or_default();
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(SandboxCall::Exec {
            sandbox: id.0.clone(),
            script: script.clone(),
        });

        if let Some(delay) = self.exec_delay {
            tokio::time::sleep(delay).await;
        }

        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        match responses.iter().position(|(needle, _)| script.contains(needle)) {
            Some(index) => Ok(responses.remove(index).1),
            None => Ok(ExecResult::default()),
        }
    }

    async fn is_available(&self) -> bool {
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_spec_defaults() {
        let spec = SandboxSpec::default();
        assert_eq!(spec.image_name, "wex-flutter-option");
        assert_eq!(spec.mount_point, "/var/www/html");
        assert!(spec.exec_timeout.is_none());
    }

    #[test]
    fn test_container_name_is_stable_per_root() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let spec = SandboxSpec::default();

        let root_a = ProjectRoot::resolve(a.path()).unwrap();
        let name = spec.container_name(&root_a);
        assert!(name.starts_with("wex-flutter-option-"));
        assert_eq!(name.len(), "wex-flutter-option-".len() + 12);
        assert_eq!(name, spec.container_name(&ProjectRoot::resolve(a.path()).unwrap()));
        assert_ne!(name, spec.container_name(&ProjectRoot::resolve(b.path()).unwrap()));
    }

    #[test]
    fn test_exec_result_success() {
        assert!(ExecResult::ok("hello").success());
        assert!(!ExecResult::failed(1, "boom").success());

        let timeout_result = ExecResult {
            timed_out: true,
            ..Default::default()
        };
        assert!(!timeout_result.success());
    }

    #[test]
    fn test_combined_output() {
        assert_eq!(ExecResult::ok("out").combined_output(), "out");
        assert_eq!(ExecResult::failed(1, "err").combined_output(), "err");
        let both = ExecResult {
            stdout: "out".into(),
            stderr: "err".into(),
            ..Default::default()
        };
        assert_eq!(both.combined_output(), "out\n--- stderr ---\nerr");
    }

    #[tokio::test]
    async fn test_mock_sandbox_scripted_responses() {
        let dir = tempfile::tempdir().unwrap();
        let root = ProjectRoot::resolve(dir.path()).unwrap();
        let mock = MockSandbox::new()
            .respond_to("dart format", ExecResult::failed(65, "parse error"))
            .fail_ensure_running(1);
        let spec = SandboxSpec::default();

        assert!(mock.ensure_running(&spec, &root).await.is_err());
        let id = mock.ensure_running(&spec, &root).await.unwrap();
        assert_eq!(id.0, spec.container_name(&root));

        let argv = |s: &str| vec!["bash".to_string(), "-lc".to_string(), s.to_string()];
        assert!(mock.exec(&id, &argv("dart fix --apply x"), None).await.unwrap().success());
        assert_eq!(mock.exec(&id, &argv("dart format x"), None).await.unwrap().exit_code, 65);
        // responses are consumed once
        assert!(mock.exec(&id, &argv("dart format x"), None).await.unwrap().success());

        assert_eq!(mock.ensure_running_count(), 2);
        assert_eq!(mock.count_scripts_containing("dart format"), 2);
        assert_eq!(mock.scripts()[0], "dart fix --apply x");
    }

    #[tokio::test]
    async fn test_mock_sandbox_survives_poisoned_lock() {
        let dir = tempfile::tempdir().unwrap();
        let root = ProjectRoot::resolve(dir.path()).unwrap();
        let mock = std::sync::Arc::new(MockSandbox::new());

        let poisoner = mock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.calls.lock().unwrap();
            panic!("poison the call log");
        })
        .join();
        assert!(mock.calls.is_poisoned());

        mock.ensure_running(&SandboxSpec::default(), &root).await.unwrap();
        assert_eq!(mock.ensure_running_count(), 1);
    }
}
