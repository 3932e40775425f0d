//! Logging configuration.

use filestate_flutter_core::config::LoggingSettings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Configure stderr logging, plain or JSON.
///
/// The filter comes from `logging.filter`, then `RUST_LOG`, then `info`.
pub fn configure_tracing(settings: &LoggingSettings) -> anyhow::Result<()> {
    let directives = settings
        .filter
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".into());
    let env_filter = tracing_subscriber::EnvFilter::try_new(directives)?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if settings.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}
