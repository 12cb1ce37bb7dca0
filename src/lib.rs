//! # settings-monitor
//!
//! Change detection and notification for hot-reloaded configuration.
//!
//! ## Overview
//!
//! Configuration providers that reload from files or remote stores tend to
//! fire their "reloaded" signal far more often than the content actually
//! changes, sometimes several times for a single save. `settings-monitor`
//! sits between such a provider and the rest of the application:
//! - Each named configuration slot keeps a published value and a content fingerprint
//! - Reloads with identical content are absorbed silently
//! - Real changes are published atomically and announced exactly once,
//!   with a per-field description of what changed
//! - Reads are lock-free through `arc-swap`
//!
//! ## Quick Start
//!
//! ```rust
//! use serde::Serialize;
//! use settings_monitor::prelude::*;
//!
//! #[derive(Debug, Clone, Serialize)]
//! #[serde(rename_all = "PascalCase")]
//! struct AzureSettings {
//!     connection_string: String,
//!     tenant_id: String,
//! }
//!
//! # fn main() -> Result<()> {
//! let monitor = SettingsMonitor::builder()
//!     .with_redacted_field("ConnectionString")
//!     .build()?;
//!
//! let mut changes = monitor.subscribe(SlotFilter::Any)?;
//!
//! let settings = AzureSettings {
//!     connection_string: "Endpoint=a".into(),
//!     tenant_id: "1".into(),
//! };
//! monitor.on_reload("TenantName", settings.clone())?;
//! // Same content again: nothing is published.
//! monitor.on_reload("TenantName", settings)?;
//!
//! let change = changes.try_recv().expect("one change");
//! assert_eq!(change.slot().as_str(), "TenantName");
//! assert!(changes.try_recv().is_none());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): watch settings files and reload on change
//! - `metrics`: OpenTelemetry counters for reloads, changes and faults

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod redact;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        ChangeDescription, FaultKind, FieldChange, Fingerprint, MonitorFault, PollResult,
        ReloadOutcome, SettingsMonitor, SettingsMonitorBuilder, SlotFilter, SlotName,
    };
    pub use crate::error::{MonitorError, Result};
    pub use crate::redact::RedactionPolicy;
    pub use crate::sources::ConfigSource;
}
