//! Source traits.

use crate::core::SlotName;
use crate::error::Result;
use std::sync::Arc;

/// Callback a source invokes with the freshly loaded value of a slot.
pub type ReloadCallback<T> = Arc<dyn Fn(SlotName, T) + Send + Sync>;

/// A provider of settings values that announces reloads.
///
/// Sources are free to fire the callback spuriously, for example on every
/// write to a file whether or not its content changed. The monitor collapses
/// those repeats.
///
/// # Examples
///
/// ```rust
/// use settings_monitor::prelude::*;
/// use settings_monitor::sources::MemorySource;
/// use serde_json::json;
///
/// # fn main() -> Result<()> {
/// let source = MemorySource::new("memory");
/// source.set("", json!({ "TenantId": "1" }));
///
/// let monitor = SettingsMonitor::new();
/// monitor.attach(&source)?;
/// assert!(monitor.default_settings().is_some());
/// # Ok(())
/// # }
/// ```
pub trait ConfigSource<T>: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> String;

    /// Slots this source currently provides.
    fn slots(&self) -> Vec<SlotName>;

    /// Load the current value of a slot.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::UnknownSlot`](crate::error::MonitorError::UnknownSlot)
    /// for a slot the source does not provide, or a load error.
    fn current_value(&self, slot: &SlotName) -> Result<T>;

    /// Register a callback fired on every reload of any slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot accept further callbacks.
    fn on_reload(&self, callback: ReloadCallback<T>) -> Result<()>;
}

/// A single layer of raw configuration merged by [`SectionSource`](super::SectionSource).
///
/// Implement this trait to add custom layers such as a key-value store.
pub trait ConfigLayer: Send + Sync {
    /// Load the layer as a raw key-value map.
    ///
    /// Keys may be top-level names holding nested tables or dotted paths such
    /// as `azure_settings.tenant_id`. Tables are deep-merged with lower
    /// priority layers, so a layer only needs to carry the fields it sets.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer cannot be loaded or parsed.
    fn load(&self) -> Result<config::Map<String, config::Value>>;

    /// Human-readable name for logging.
    fn name(&self) -> String;

    /// Priority of this layer (higher takes precedence).
    ///
    /// Default priorities:
    /// - Environment variables: 300
    /// - Files: 100 and up, in the order they were added
    fn priority(&self) -> i32 {
        100
    }
}
