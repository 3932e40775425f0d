use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "filestate-flutter.toml";

/// Sandbox image Dockerfile shipped with the package, independent of the
/// working directory.
pub const DEFAULT_DOCKERFILE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../resources/docker/Dockerfile.flutter-option"
);

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub sandbox: SandboxSettings,
    pub preparation: PreparationSettings,
    pub flutter: FlutterConfigValue,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SandboxSettings {
    pub image_name: String,
    pub dockerfile_path: PathBuf,
    /// Where the project root is mounted inside the container.
    pub mount_point: String,
    /// Prepended to `PATH` before every toolchain command.
    pub toolchain_paths: Vec<String>,
    pub exec_timeout_secs: Option<u64>,
}

impl SandboxSettings {
    pub fn exec_timeout(&self) -> Option<Duration> {
        self.exec_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            image_name: "wex-flutter-option".into(),
            dockerfile_path: PathBuf::from(DEFAULT_DOCKERFILE),
            mount_point: "/var/www/html".into(),
            toolchain_paths: vec![
                "/usr/local/flutter/bin".into(),
                "/usr/lib/dart/bin".into(),
                "/sdks/flutter/bin".into(),
            ],
            exec_timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct PreparationSettings {
    /// Fail fast on roots whose preparation failed less than this many
    /// seconds ago. Unset means every call retries.
    pub failure_cooldown_secs: Option<u64>,
}

impl PreparationSettings {
    pub fn failure_cooldown(&self) -> Option<Duration> {
        self.failure_cooldown_secs.map(Duration::from_secs)
    }
}

/// Declarative selection of the Flutter content options for a file.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct FlutterConfigValue {
    /// Format and fix Dart/Flutter code using dart format and dart fix.
    pub dart_format: Option<bool>,
}

impl FlutterConfigValue {
    /// Option name used by [`Self::to_option_raw_value`].
    pub const DART_FORMAT: &'static str = "dart_format";

    /// Raw option map, keyed by option name.
    pub fn to_option_raw_value(&self) -> serde_json::Value {
        let mut raw = serde_json::Map::new();
        raw.insert(Self::DART_FORMAT.to_string(), serde_json::json!(self.dart_format));
        serde_json::Value::Object(raw)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct LoggingSettings {
    pub json: bool,
    /// Overrides `RUST_LOG` when set.
    pub filter: Option<String>,
}

impl AppConfig {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// An explicit `path` must exist; otherwise `filestate-flutter.toml` in the
    /// working directory is used when present.
    /// Environment variables map like `FILESTATE_FLUTTER__SANDBOX__MOUNT_POINT`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let s = builder
            .add_source(Environment::with_prefix("FILESTATE_FLUTTER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
