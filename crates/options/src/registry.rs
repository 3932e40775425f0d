//! Content option registry.

use std::sync::Arc;

use filestate_flutter_core::config::FlutterConfigValue;
use filestate_flutter_core::{Error, FileContentOption, Result, TargetFile};
use filestate_flutter_sandbox::SandboxSession;

use crate::dart_format::DartFormatOption;

/// Ordered set of content options applied to a file.
#[derive(Default)]
pub struct ContentOptionRegistry {
    options: Vec<Arc<dyn FileContentOption>>,
}

impl ContentOptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options enabled by a declarative Flutter config value.
    pub fn from_config_value(value: &FlutterConfigValue, session: Arc<SandboxSession>) -> Self {
        let mut registry = Self::new();
        if value.dart_format.unwrap_or(false) {
            registry.options.push(Arc::new(DartFormatOption::new(session)));
        }
        registry
    }

    /// Register an option. Names must be unique.
    pub fn register(&mut self, option: Arc<dyn FileContentOption>) -> Result<()> {
        let name = option.name().to_string();
        if self.get(&name).is_some() {
            return Err(Error::internal(format!(
                "Option '{}' is already registered",
                name
            )));
        }
        tracing::debug!(option = %name, "Registering content option");
        self.options.push(option);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FileContentOption>> {
        self.options.iter().find(|o| o.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.options.iter().map(|o| o.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Apply every option in order and return the final content.
    ///
    /// Each option rewrites the file in place, so the content returned by
    /// the last one is the file's new content.
    pub async fn apply_all(&self, target: &dyn TargetFile) -> Result<String> {
        let mut content = target.read_text().await?;
        for option in &self.options {
            tracing::debug!(option = %option.name(), file = %target.path().display(), "Applying content option");
            content = option.apply(target).await?;
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filestate_flutter_core::config::AppConfig;
    use filestate_flutter_sandbox::MockSandbox;

    fn session() -> Arc<SandboxSession> {
        Arc::new(SandboxSession::from_config(
            Arc::new(MockSandbox::new()),
            &AppConfig::default(),
        ))
    }

    #[test]
    fn test_from_config_value() {
        let enabled = FlutterConfigValue {
            dart_format: Some(true),
        };
        assert_eq!(
            ContentOptionRegistry::from_config_value(&enabled, session()).names(),
            vec!["dart_format".to_string()]
        );

        for disabled in [None, Some(false)] {
            let value = FlutterConfigValue {
                dart_format: disabled,
            };
            assert!(ContentOptionRegistry::from_config_value(&value, session()).is_empty());
        }
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = ContentOptionRegistry::new();
        registry
            .register(Arc::new(DartFormatOption::new(session())))
            .unwrap();
        assert!(registry
            .register(Arc::new(DartFormatOption::new(session())))
            .is_err());
        assert_eq!(registry.len(), 1);
        assert!(registry.get("dart_format").is_some());
    }
}
