//! Dependency resolution inside the sandbox.
//!
//! Which package manager to use depends on what the sandbox image ships for
//! a given project, which only the sandbox knows. The choice is therefore an
//! explicit two-branch decision, rendered into one shell conditional that is
//! evaluated inside the container.
//!
//! Detection rule: the primary tool is used iff `command -v <binary>`
//! succeeds on the sandbox's configured `PATH`.

use serde::{Deserialize, Serialize};

/// A toolchain able to resolve pub dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PubTool {
    /// `flutter pub get` (Flutter SDK projects).
    Flutter,
    /// `dart pub get` (plain Dart SDK).
    Dart,
}

impl PubTool {
    pub fn binary(&self) -> &'static str {
        match self {
            PubTool::Flutter => "flutter",
            PubTool::Dart => "dart",
        }
    }

    pub fn pub_get(&self) -> String {
        format!("{} pub get", self.binary())
    }
}

/// Primary/fallback selection of the dependency resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyResolution {
    pub primary: PubTool,
    pub fallback: PubTool,
}

impl Default for DependencyResolution {
    fn default() -> Self {
        Self {
            primary: PubTool::Flutter,
            fallback: PubTool::Dart,
        }
    }
}

impl DependencyResolution {
    /// Shell test that succeeds when the primary tool is on `PATH`.
    pub fn detection_probe(&self) -> String {
        format!("command -v {} >/dev/null 2>&1", self.primary.binary())
    }

    /// The tool the sandbox will pick, given the outcome of the probe.
    pub fn select(&self, primary_available: bool) -> PubTool {
        if primary_available {
            self.primary
        } else {
            self.fallback
        }
    }

    /// The single shell conditional run inside the sandbox.
    pub fn script(&self) -> String {
        format!(
            "if {}; then {}; else {}; fi",
            self.detection_probe(),
            self.select(true).pub_get(),
            self.select(false).pub_get()
        )
    }
}
