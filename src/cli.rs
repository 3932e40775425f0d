//! Command-line arguments and the per-file loop.

use clap::Parser;
use std::path::{Path, PathBuf};

use filestate_flutter_core::{LocalTargetFile, Result, TargetFile};
use filestate_flutter_options::{discover_root, is_flutter_file, ContentOptionRegistry};

/// Format and fix Dart files inside a Flutter sandbox container
#[derive(Debug, Parser)]
#[command(name = "filestate-flutter", author, version)]
pub struct Args {
    /// Dart files to transform
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Configuration file (default: ./filestate-flutter.toml when present)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Project root shared by all files (default: nearest pubspec.yaml)
    #[arg(short = 'r', long = "root")]
    pub root: Option<PathBuf>,

    /// Exit with an error when any file changed
    #[arg(long = "check", default_value_t = false)]
    pub check: bool,

    /// Emit logs as JSON
    #[arg(long = "json-logs", default_value_t = false)]
    pub json_logs: bool,
}

/// Outcome of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Changed,
    Unchanged,
    Skipped,
    Failed(String),
}

/// Outcomes of a whole run, in input order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<(PathBuf, FileOutcome)>,
}

impl RunReport {
    pub fn count(&self, wanted: fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| wanted(o)).count()
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }

    pub fn changed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Changed))
    }
}

/// Apply `registry` to every file, sequentially.
pub async fn process_files(
    registry: &ContentOptionRegistry,
    files: &[PathBuf],
    root: Option<&Path>,
) -> RunReport {
    let mut report = RunReport::default();

    for file in files {
        let outcome = if !is_flutter_file(file) {
            tracing::warn!(file = %file.display(), "Not a Dart file, skipping");
            FileOutcome::Skipped
        } else {
            match process_file(registry, file, root).await {
                Ok(true) => FileOutcome::Changed,
                Ok(false) => FileOutcome::Unchanged,
                Err(e) => {
                    tracing::error!(file = %file.display(), error = %e, "Transformation failed");
                    FileOutcome::Failed(e.to_string())
                }
            }
        };
        report.outcomes.push((file.clone(), outcome));
    }

    report
}

async fn process_file(
    registry: &ContentOptionRegistry,
    file: &Path,
    root: Option<&Path>,
) -> Result<bool> {
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => discover_root(&std::path::absolute(file)?),
    };
    let target = LocalTargetFile::new(&root, file)?;

    let before = target.read_text().await?;
    let after = registry.apply_all(&target).await?;
    Ok(before != after)
}
