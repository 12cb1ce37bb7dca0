//! In-process configuration source.

use super::{ConfigSource, ReloadCallback};
use crate::core::SlotName;
use crate::error::{MonitorError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A source whose values are set programmatically.
///
/// Every [`set`](Self::set) fires the registered callbacks, including writes
/// that repeat the current value, just like file-backed providers that reload
/// on every save.
///
/// # Examples
///
/// ```rust
/// use settings_monitor::sources::{ConfigSource, MemorySource};
/// use serde_json::json;
///
/// let source = MemorySource::new("tenants");
/// source.set("TenantName", json!({ "TenantId": "2" }));
/// assert_eq!(source.slots().len(), 1);
/// ```
pub struct MemorySource<T> {
    name: String,
    values: RwLock<BTreeMap<SlotName, T>>,
    callbacks: RwLock<Vec<ReloadCallback<T>>>,
}

impl<T> MemorySource<T>
where
    T: Clone + Send + Sync,
{
    /// Create an empty source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: RwLock::new(BTreeMap::new()),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Store a value and fire every callback with it.
    pub fn set(&self, slot: impl Into<SlotName>, value: T) {
        let slot = slot.into();
        self.values.write().insert(slot.clone(), value.clone());

        let callbacks = self.callbacks.read().clone();
        tracing::trace!(source = %self.name, slot = %slot, callbacks = callbacks.len(), "memory source reload");
        for callback in callbacks {
            callback(slot.clone(), value.clone());
        }
    }

    /// Store a value without firing callbacks.
    pub fn preload(&self, slot: impl Into<SlotName>, value: T) {
        self.values.write().insert(slot.into(), value);
    }
}

impl<T> ConfigSource<T> for MemorySource<T>
where
    T: Clone + Send + Sync,
{
    fn name(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn slots(&self) -> Vec<SlotName> {
        self.values.read().keys().cloned().collect()
    }

    fn current_value(&self, slot: &SlotName) -> Result<T> {
        self.values
            .read()
            .get(slot)
            .cloned()
            .ok_or_else(|| MonitorError::UnknownSlot(slot.clone()))
    }

    fn on_reload(&self, callback: ReloadCallback<T>) -> Result<()> {
        self.callbacks.write().push(callback);
        Ok(())
    }
}
