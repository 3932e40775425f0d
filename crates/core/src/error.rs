//! Error types for filestate-flutter.

use thiserror::Error;

/// Result type alias using filestate-flutter's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for filestate-flutter.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Sandbox Errors
    // =========================================================================
    /// Sandbox startup or dependency resolution failed for a project root.
    /// Never cached: the next attempt on the same root starts from scratch.
    #[error("Sandbox preparation failed for {root}: {source}")]
    SandboxPreparation {
        root: String,
        #[source]
        source: Box<Error>,
    },

    /// A toolchain command exited non-zero, timed out, or could not be
    /// delivered to the sandbox.
    #[error("Sandbox command failed{}: {command}\n{output}", exit_suffix(.exit_code))]
    SandboxExecution {
        command: String,
        exit_code: Option<i64>,
        output: String,
    },

    /// The container driver itself failed (daemon unreachable, image build
    /// failed, container could not be created or started).
    #[error("Container driver error: {0}")]
    Driver(String),

    // =========================================================================
    // Target Errors
    // =========================================================================
    #[error("Path {path} is outside of project root {root}")]
    PathOutsideRoot { path: String, root: String },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn exit_suffix(exit_code: &Option<i64>) -> String {
    match exit_code {
        Some(code) => format!(" (exit code {})", code),
        None => String::new(),
    }
}

impl Error {
    /// Wrap an error raised while preparing the sandbox for `root`.
    pub fn preparation(root: impl Into<String>, source: Error) -> Self {
        Self::SandboxPreparation {
            root: root.into(),
            source: Box::new(source),
        }
    }

    /// Create a container driver error.
    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }

    /// Create an invalid target error.
    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Exit code of the failed sandbox command, if the command ran at all.
    pub fn exit_code(&self) -> Option<i64> {
        match self {
            Self::SandboxExecution { exit_code, .. } => *exit_code,
            Self::SandboxPreparation { source, .. } => source.exit_code(),
            _ => None,
        }
    }
}
