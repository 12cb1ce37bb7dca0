//! Environment variable configuration layer.

use super::ConfigLayer;
use crate::error::{MonitorError, Result};
use config::{Environment, Map, Source, Value};

/// Prefixed environment variables, nested on a separator.
///
/// `APP_AZURE_SETTINGS__TENANT_ID=7` with prefix `APP` and separator `__`
/// sets `azure_settings.tenant_id`. Values that parse as numbers or booleans
/// are typed accordingly.
///
/// # Examples
///
/// ```rust
/// use settings_monitor::sources::EnvLayer;
///
/// let overrides = EnvLayer::new("APP", "__");
/// ```
pub struct EnvLayer {
    prefix: String,
    separator: String,
    priority: i32,
}

impl EnvLayer {
    /// Layer for variables starting with `{prefix}_`, at priority 300.
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            priority: 300,
        }
    }

    /// Set the priority for this layer.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl ConfigLayer for EnvLayer {
    fn load(&self) -> Result<Map<String, Value>> {
        Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .separator(&self.separator)
            .try_parsing(true)
            .collect()
            .map_err(|e| MonitorError::LoadError(format!("{}: {e}", self.name())))
    }

    fn name(&self) -> String {
        format!("env:{}*", self.prefix)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
#[allow(unsafe_code)] // env var manipulation
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_env_layer_creation() {
        let layer = EnvLayer::new("APP", "__");
        assert_eq!(layer.prefix, "APP");
        assert_eq!(layer.separator, "__");
        assert_eq!(layer.priority(), 300);
        assert_eq!(layer.with_priority(400).priority(), 400);
    }

    #[test]
    fn test_name() {
        assert_eq!(EnvLayer::new("APP", "__").name(), "env:APP*");
    }

    #[test]
    fn test_load_splits_nested_key() {
        unsafe {
            env::set_var("SMENVTEST_AZURE_SETTINGS__TENANT_ID", "tenant-7");
        }

        let map = EnvLayer::new("SMENVTEST", "__").load().unwrap();

        unsafe {
            env::remove_var("SMENVTEST_AZURE_SETTINGS__TENANT_ID");
        }
        let value = map
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("azure_settings.tenant_id"))
            .map(|(_, value)| value.clone().into_string().unwrap());
        assert_eq!(value.as_deref(), Some("tenant-7"));
    }

    #[test]
    fn test_load_without_matches() {
        let map = EnvLayer::new("SMENVTEST_NONEXISTENT", "__").load().unwrap();
        assert!(map.is_empty());
    }
}
