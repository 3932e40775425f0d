//! Per-root sandbox environment preparation.
//!
//! Preparing a root means: wipe host caches, make sure the sandbox runs,
//! then resolve dependencies inside it. This is expensive, so each root is
//! prepared at most once per [`PreparedRootRegistry`]; failures are never
//! remembered as success.

use dashmap::DashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

use filestate_flutter_core::{Error, ProjectRoot, Result};

use crate::resolver::DependencyResolution;
use crate::runner::SandboxCommandRunner;
use crate::sanitizer::HostCacheSanitizer;

// =============================================================================
// Prepared Root Registry
// =============================================================================

#[derive(Default)]
struct RootSlot {
    ready: OnceCell<()>,
    last_failure: Mutex<Option<Instant>>,
}

/// Canonical root keys whose preparation has completed.
///
/// Each key owns an initialize-once cell: concurrent callers for the same
/// root wait on a single preparation, a success is final, and a failure
/// leaves the cell empty so that the next caller starts over.
#[derive(Default)]
pub struct PreparedRootRegistry {
    slots: DashMap<String, Arc<RootSlot>>,
}

impl PreparedRootRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<RootSlot> {
        self.slots.entry(key.to_string()).or_default().clone()
    }

    /// Whether `key` has been prepared successfully.
    pub fn is_prepared(&self, key: &str) -> bool {
        self.slots
            .get(key)
            .map(|slot| slot.ready.initialized())
            .unwrap_or(false)
    }

    /// Number of prepared roots.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.ready.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How long ago the last failed preparation of `key` happened.
    pub fn since_last_failure(&self, key: &str) -> Option<Duration> {
        let slot = self.slots.get(key)?;
        let last = *slot.last_failure.lock().unwrap_or_else(|e| e.into_inner());
        last.map(|at| at.elapsed())
    }

    /// Run `prepare` unless `key` is already prepared.
    ///
    /// Returns `true` when this call performed the preparation.
    pub async fn get_or_prepare<F, Fut>(&self, key: &str, prepare: F) -> Result<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let slot = self.slot(key);
        if slot.ready.initialized() {
            return Ok(false);
        }

        let mut ran = false;
        let outcome = slot
            .ready
            .get_or_try_init(|| {
                ran = true;
                prepare()
            })
            .await;

        match outcome {
            Ok(_) => Ok(ran),
            Err(e) => {
                *slot.last_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
                Err(e)
            }
        }
    }
}

// =============================================================================
// Sandbox Environment Preparer
// =============================================================================

/// Prepares the sandbox environment of project roots, once per root.
pub struct SandboxEnvironmentPreparer {
    runner: Arc<SandboxCommandRunner>,
    registry: Arc<PreparedRootRegistry>,
    sanitizer: HostCacheSanitizer,
    resolution: DependencyResolution,
    failure_cooldown: Option<Duration>,
}

impl SandboxEnvironmentPreparer {
    pub fn new(runner: Arc<SandboxCommandRunner>, registry: Arc<PreparedRootRegistry>) -> Self {
        Self {
            runner,
            registry,
            sanitizer: HostCacheSanitizer::default(),
            resolution: DependencyResolution::default(),
            failure_cooldown: None,
        }
    }

    pub fn with_resolution(mut self, resolution: DependencyResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Fail fast for roots whose preparation failed within `cooldown`.
    pub fn with_failure_cooldown(mut self, cooldown: Option<Duration>) -> Self {
        self.failure_cooldown = cooldown;
        self
    }

    pub fn registry(&self) -> &Arc<PreparedRootRegistry> {
        &self.registry
    }

    /// Prepare `root` unless it already is.
    pub async fn prepare(&self, root: &ProjectRoot) -> Result<()> {
        let key = root.key();
        if self.registry.is_prepared(&key) {
            return Ok(());
        }

        if let (Some(cooldown), Some(elapsed)) =
            (self.failure_cooldown, self.registry.since_last_failure(&key))
        {
            if elapsed < cooldown {
                return Err(Error::preparation(
                    key,
                    Error::internal(format!(
                        "previous preparation failed {:?} ago, retrying after {:?}",
                        elapsed, cooldown
                    )),
                ));
            }
        }

        let ran = self
            .registry
            .get_or_prepare(&key, || self.run_preparation(root))
            .await
            .map_err(|e| {
                tracing::warn!(root = %root, error = %e, "Sandbox preparation failed");
                Error::preparation(key.clone(), e)
            })?;

        if ran {
            tracing::info!(root = %root, "Sandbox environment prepared");
        }
        Ok(())
    }

    async fn run_preparation(&self, root: &ProjectRoot) -> Result<()> {
        tracing::debug!(root = %root, "Preparing sandbox environment");

        let sanitizer = self.sanitizer.clone();
        let owned_root = root.clone();
        tokio::task::spawn_blocking(move || sanitizer.sanitize(&owned_root))
            .await
            .map_err(|e| Error::internal(format!("Cache sanitation task failed: {}", e)))?;

        let id = self.runner.ensure_running(root).await?;
        self.runner.run_in(&id, &self.resolution.script()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ExecResult, MockSandbox};
    use filestate_flutter_core::config::SandboxSettings;

    fn preparer(mock: Arc<MockSandbox>) -> SandboxEnvironmentPreparer {
        let runner = Arc::new(SandboxCommandRunner::from_settings(mock, &SandboxSettings::default()));
        SandboxEnvironmentPreparer::new(runner, Arc::new(PreparedRootRegistry::new()))
    }

    fn project() -> (tempfile::TempDir, ProjectRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = ProjectRoot::resolve(dir.path()).unwrap();
        (dir, root)
    }

    #[tokio::test]
    async fn test_registry_records_success_only() {
        let registry = PreparedRootRegistry::new();

        let err = registry
            .get_or_prepare("/proj", || async { Err(Error::internal("boom")) })
            .await;
        assert!(err.is_err());
        assert!(!registry.is_prepared("/proj"));
        assert!(registry.since_last_failure("/proj").is_some());

        assert!(registry.get_or_prepare("/proj", || async { Ok(()) }).await.unwrap());
        assert!(registry.is_prepared("/proj"));
        assert!(!registry.get_or_prepare("/proj", || async { Ok(()) }).await.unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_prepare_is_memoized() {
        let (_dir, root) = project();
        let mock = Arc::new(MockSandbox::new());
        let preparer = preparer(mock.clone());

        for _ in 0..5 {
            preparer.prepare(&root).await.unwrap();
        }

        assert_eq!(mock.count_scripts_containing("pub get"), 1);
        assert_eq!(mock.ensure_running_count(), 1);
        assert!(preparer.registry().is_prepared(&root.key()));
    }

    #[tokio::test]
    async fn test_failed_resolution_is_retried_from_scratch() {
        let (_dir, root) = project();
        let mock = Arc::new(MockSandbox::new().respond_to("pub get", ExecResult::failed(69, "version solving failed")));
        let preparer = preparer(mock.clone());

        std::fs::create_dir(root.join(".dart_tool")).unwrap();
        let err = preparer.prepare(&root).await.unwrap_err();
        assert!(matches!(err, Error::SandboxPreparation { .. }));
        assert_eq!(err.exit_code(), Some(69));
        assert!(!preparer.registry().is_prepared(&root.key()));

        // host regenerated its cache in between; the retry must wipe it again
        std::fs::create_dir(root.join(".dart_tool")).unwrap();
        preparer.prepare(&root).await.unwrap();
        assert!(!root.join(".dart_tool").exists());
        assert_eq!(mock.ensure_running_count(), 2);
        assert_eq!(mock.count_scripts_containing("pub get"), 2);
        assert!(preparer.registry().is_prepared(&root.key()));
    }

    #[tokio::test]
    async fn test_failed_start_skips_resolution() {
        let (_dir, root) = project();
        let mock = Arc::new(MockSandbox::new().fail_ensure_running(2));
        let preparer = preparer(mock.clone());

        assert!(preparer.prepare(&root).await.is_err());
        assert!(preparer.prepare(&root).await.is_err());
        assert!(mock.scripts().is_empty());

        preparer.prepare(&root).await.unwrap();
        assert_eq!(mock.ensure_running_count(), 3);
        assert_eq!(mock.count_scripts_containing("pub get"), 1);
    }

    #[tokio::test]
    async fn test_failure_cooldown_fails_fast() {
        let (_dir, root) = project();
        let mock = Arc::new(MockSandbox::new().fail_ensure_running(1));
        let preparer = preparer(mock.clone()).with_failure_cooldown(Some(Duration::from_secs(3600)));

        assert!(preparer.prepare(&root).await.is_err());
        let err = preparer.prepare(&root).await.unwrap_err();
        assert!(err.to_string().contains("retrying after"));
        assert_eq!(mock.ensure_running_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_cooldown_retries_immediately() {
        let (_dir, root) = project();
        let mock = Arc::new(MockSandbox::new().fail_ensure_running(1));
        let preparer = preparer(mock.clone()).with_failure_cooldown(Some(Duration::ZERO));

        assert!(preparer.prepare(&root).await.is_err());
        preparer.prepare(&root).await.unwrap();
        assert_eq!(mock.ensure_running_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_prepare_runs_once() {
        let (_dir, root) = project();
        let mock = Arc::new(MockSandbox::new().with_exec_delay(Duration::from_millis(50)));
        let preparer = Arc::new(preparer(mock.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let preparer = preparer.clone();
                let root = root.clone();
                tokio::spawn(async move { preparer.prepare(&root).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(mock.count_scripts_containing("pub get"), 1);
        assert_eq!(mock.ensure_running_count(), 1);
    }
}
