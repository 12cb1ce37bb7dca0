//! Layered configuration source mapping config sections to slots.

use super::{ConfigLayer, ConfigSource, EnvLayer, FileLayer, ReloadCallback};
use crate::core::SlotName;
use crate::error::{MonitorError, Result};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

#[cfg(feature = "file-watch")]
use crate::notify::ConfigWatcher;
#[cfg(feature = "file-watch")]
use std::sync::Arc;
#[cfg(feature = "file-watch")]
use std::time::Duration;

/// Loads settings from merged file and environment layers.
///
/// Each mapped section of the merged configuration becomes one slot, for
/// example `AzureSettings` for the default slot and `TenantNameAzureSettings`
/// for the `TenantName` slot. Layers are merged in priority order: files in
/// the order they were added, then environment variables.
///
/// # Examples
///
/// ```rust,no_run
/// use serde::{Deserialize, Serialize};
/// use settings_monitor::prelude::*;
/// use settings_monitor::sources::SectionSource;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct AzureSettings {
///     tenant_id: String,
/// }
///
/// # fn main() -> Result<()> {
/// let source = SectionSource::<AzureSettings>::new()
///     .with_file("appsettings.yaml")
///     .with_file("appsettings.production.yaml")
///     .with_env_overrides("APP", "__")
///     .with_section("azure_settings", SlotName::default())
///     .with_section("tenant_name_azure_settings", "TenantName");
///
/// let monitor = SettingsMonitor::new();
/// monitor.attach(&source)?;
///
/// // Later, when the files change:
/// source.reload()?;
/// # Ok(())
/// # }
/// ```
pub struct SectionSource<T> {
    layers: Vec<Box<dyn ConfigLayer>>,
    files: Vec<PathBuf>,
    sections: Vec<(String, SlotName)>,
    callbacks: RwLock<Vec<ReloadCallback<T>>>,
}

impl<T> SectionSource<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a source without layers or sections.
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            files: Vec::new(),
            sections: Vec::new(),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Add a configuration file. Later files override earlier ones.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let priority = 100 + self.files.len() as i32 * 10;
        self.layers
            .push(Box::new(FileLayer::new(path.clone()).with_priority(priority)));
        self.files.push(path);
        self
    }

    /// Override file values with prefixed environment variables.
    pub fn with_env_overrides(mut self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.layers.push(Box::new(EnvLayer::new(prefix, separator)));
        self
    }

    /// Add a custom layer.
    pub fn with_layer(mut self, layer: Box<dyn ConfigLayer>) -> Self {
        self.layers.push(layer);
        self
    }

    /// Map a section of the merged configuration to a slot.
    pub fn with_section(mut self, path: impl Into<String>, slot: impl Into<SlotName>) -> Self {
        self.sections.push((path.into(), slot.into()));
        self
    }

    /// Re-read every layer and fire the callbacks for every mapped slot.
    ///
    /// Sections that fail to deserialize are skipped with a warning so the
    /// monitor keeps their previous value. Returns the number of slots fired.
    ///
    /// # Errors
    ///
    /// Returns an error if the layers cannot be loaded or merged.
    pub fn reload(&self) -> Result<usize> {
        let config = self.load_merged()?;

        let mut values = Vec::with_capacity(self.sections.len());
        for (path, slot) in &self.sections {
            match Self::section(&config, path) {
                Ok(value) => values.push((slot.clone(), value)),
                Err(err) => {
                    tracing::warn!(section = %path, slot = %slot, error = %err, "skipping section on reload");
                }
            }
        }

        let callbacks = self.callbacks.read().clone();
        let fired = values.len();
        for (slot, value) in values {
            for callback in &callbacks {
                callback(slot.clone(), value.clone());
            }
        }

        tracing::debug!(slots = fired, "section source reloaded");
        Ok(fired)
    }

    /// Watch the file layers and reload when they change.
    ///
    /// Reloads stop when the returned watcher is dropped. Must be called from
    /// within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be watched.
    #[cfg(feature = "file-watch")]
    pub async fn watch(self: &Arc<Self>, debounce: Duration) -> Result<ConfigWatcher> {
        let (watcher, mut rx) = ConfigWatcher::new(debounce)?;
        for path in &self.files {
            watcher.watch(path).await?;
        }

        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let Some(source) = weak.upgrade() else {
                    break;
                };
                if let Err(err) = source.reload() {
                    tracing::warn!(error = %err, "file change could not be reloaded");
                }
            }
        });

        tracing::info!(files = self.files.len(), "watching settings files");
        Ok(watcher)
    }

    fn load_merged(&self) -> Result<config::Config> {
        if self.layers.is_empty() {
            return Err(MonitorError::LoadError(
                "No configuration layers specified".to_string(),
            ));
        }

        let mut sorted: Vec<_> = self.layers.iter().collect();
        sorted.sort_by_key(|layer| layer.priority());

        // Sources are applied in order and tables deep-merge, so a layer that
        // sets one field of a section leaves its other fields in place.
        let mut builder = config::Config::builder();
        for layer in sorted {
            let values = layer.load().map_err(|e| {
                MonitorError::LoadError(format!("Failed to load layer '{}': {}", layer.name(), e))
            })?;
            builder = builder.add_source(LoadedLayer(values));
        }

        builder
            .build()
            .map_err(|e| MonitorError::LoadError(format!("Failed to merge layers: {}", e)))
    }

    fn section(config: &config::Config, path: &str) -> Result<T> {
        config.get::<T>(path).map_err(|e| {
            MonitorError::DeserializationError(format!("Failed to read section '{}': {}", path, e))
        })
    }
}

/// One layer's loaded map, replayed into the merge.
#[derive(Debug, Clone)]
struct LoadedLayer(config::Map<String, config::Value>);

impl config::Source for LoadedLayer {
    fn clone_into_box(&self) -> Box<dyn config::Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(
        &self,
    ) -> std::result::Result<config::Map<String, config::Value>, config::ConfigError> {
        Ok(self.0.clone())
    }
}

impl<T> Default for SectionSource<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConfigSource<T> for SectionSource<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn name(&self) -> String {
        let mut sorted: Vec<_> = self.layers.iter().collect();
        sorted.sort_by_key(|layer| layer.priority());
        let names: Vec<String> = sorted.iter().map(|layer| layer.name()).collect();
        format!("sections[{}]", names.join(", "))
    }

    fn slots(&self) -> Vec<SlotName> {
        self.sections.iter().map(|(_, slot)| slot.clone()).collect()
    }

    fn current_value(&self, slot: &SlotName) -> Result<T> {
        let (path, _) = self
            .sections
            .iter()
            .find(|(_, mapped)| mapped == slot)
            .ok_or_else(|| MonitorError::UnknownSlot(slot.clone()))?;

        let config = self.load_merged()?;
        Self::section(&config, path)
    }

    fn on_reload(&self, callback: ReloadCallback<T>) -> Result<()> {
        self.callbacks.write().push(callback);
        Ok(())
    }
}
