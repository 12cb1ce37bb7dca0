//! Slot identity and subscription filters.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Name of an independently tracked configuration slot.
///
/// The empty string is the default slot. Every other name identifies a named
/// slot, for example a tenant-specific section of the configuration.
///
/// # Examples
///
/// ```rust
/// use settings_monitor::core::SlotName;
///
/// assert!(SlotName::default().is_default());
/// assert_eq!(SlotName::new("TenantName").as_str(), "TenantName");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotName(String);

impl SlotName {
    /// Create a slot name. An empty name denotes the default slot.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The raw name, empty for the default slot.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the default slot.
    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            f.write_str("<default>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for SlotName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SlotName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&SlotName> for SlotName {
    fn from(name: &SlotName) -> Self {
        name.clone()
    }
}

impl Borrow<str> for SlotName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Which slots a subscription wants to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotFilter {
    /// Every slot.
    Any,
    /// A single slot.
    Slot(SlotName),
}

impl SlotFilter {
    /// Filter on a single slot.
    pub fn slot(name: impl Into<SlotName>) -> Self {
        Self::Slot(name.into())
    }

    /// Whether a change for `slot` passes this filter.
    pub fn matches(&self, slot: &SlotName) -> bool {
        match self {
            Self::Any => true,
            Self::Slot(wanted) => wanted == slot,
        }
    }
}

impl From<SlotName> for SlotFilter {
    fn from(name: SlotName) -> Self {
        Self::Slot(name)
    }
}

impl From<&str> for SlotFilter {
    fn from(name: &str) -> Self {
        Self::Slot(SlotName::new(name))
    }
}
