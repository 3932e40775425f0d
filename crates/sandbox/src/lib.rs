#![deny(unused)]
//! Containerized transformation sessions for filestate-flutter.
//!
//! This crate runs the Dart/Flutter toolchain inside a Docker container
//! that bind-mounts the project root, so content options can rewrite files
//! with tools the host may not have (or may have in an incompatible setup).
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │  Content option (DartFormatOption)     │
//! │    ↓ prepare + run                     │
//! ├────────────────────────────────────────┤
//! │  SandboxSession                        │
//! │    SandboxEnvironmentPreparer          │
//! │      sanitize → ensure running → pub   │
//! │    SandboxCommandRunner                │
//! │      PATH + cd <mount> + command       │
//! ├────────────────────────────────────────┤
//! │  Sandbox Engine (DockerSandbox)        │
//! │    ↓ Docker API via bollard            │
//! ├────────────────────────────────────────┤
//! │  Docker Container (one per root)       │
//! │    /var/www/html  (bind mount of root) │
//! └────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use filestate_flutter_sandbox::{DockerSandbox, SandboxSession};
//!
//! let engine = Arc::new(DockerSandbox::new()?);
//! let session = Arc::new(SandboxSession::from_config(engine, &config));
//!
//! session.prepare(&root).await?;
//! let version = session.run(&root, "dart --version").await?;
//! ```

pub mod container_path;
pub mod engine;
pub mod preparer;
pub mod resolver;
pub mod runner;
pub mod sanitizer;
pub mod session;

pub use container_path::{container_path, shell_quote};
pub use engine::{
    DockerSandbox, ExecResult, MockSandbox, SandboxCall, SandboxEngine, SandboxId, SandboxSpec,
};
pub use preparer::{PreparedRootRegistry, SandboxEnvironmentPreparer};
pub use resolver::{DependencyResolution, PubTool};
pub use runner::SandboxCommandRunner;
pub use sanitizer::HostCacheSanitizer;
pub use session::SandboxSession;
