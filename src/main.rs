#![deny(unused)]
//! filestate-flutter - format and fix Dart files inside a sandboxed toolchain.
//!
//! Each project root gets one Docker container with the root bind-mounted;
//! dependencies are resolved in it once per run, then every file is fixed
//! and formatted in place.

mod cli;
mod tracing_layer;

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use filestate_flutter_core::config::{AppConfig, FlutterConfigValue};
use filestate_flutter_options::ContentOptionRegistry;
use filestate_flutter_sandbox::{DockerSandbox, SandboxEngine, SandboxSession};

use cli::{Args, FileOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.logging.json |= args.json_logs;
    tracing_layer::configure_tracing(&config.logging)?;

    tracing::info!("Starting filestate-flutter v{}", env!("CARGO_PKG_VERSION"));

    // The CLI exists to run dart_format; only an explicit `false` turns it off.
    let options = FlutterConfigValue {
        dart_format: Some(config.flutter.dart_format.unwrap_or(true)),
    };
    tracing::debug!(options = %options.to_option_raw_value(), "Flutter options");

    let engine = Arc::new(DockerSandbox::new()?);
    if !engine.is_available().await {
        anyhow::bail!("Docker daemon not reachable");
    }
    let session = Arc::new(SandboxSession::from_config(engine, &config));

    let registry = ContentOptionRegistry::from_config_value(&options, session);
    if registry.is_empty() {
        tracing::warn!("No content option enabled (flutter.dart_format = false), nothing to do");
        return Ok(ExitCode::SUCCESS);
    }

    let report = cli::process_files(&registry, &args.files, args.root.as_deref()).await;

    for (file, outcome) in &report.outcomes {
        match outcome {
            FileOutcome::Changed => println!("formatted  {}", file.display()),
            FileOutcome::Unchanged => println!("unchanged  {}", file.display()),
            FileOutcome::Skipped => println!("skipped    {}", file.display()),
            FileOutcome::Failed(reason) => println!("failed     {}: {}", file.display(), reason),
        }
    }

    tracing::info!(
        files = report.outcomes.len(),
        changed = report.changed(),
        failed = report.failed(),
        "Done"
    );

    if report.failed() > 0 || (args.check && report.changed() > 0) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
