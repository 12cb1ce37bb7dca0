//! Builder for constructing SettingsMonitor instances.

use crate::core::detector::ChangeDetector;
use crate::core::fault::FaultReporter;
use crate::core::fingerprint::{Fingerprinter, Sha256Fingerprinter};
use crate::core::monitor::{MonitorInner, SettingsMonitor};
use crate::core::slot::SlotName;
use crate::core::state::SlotRegistry;
use crate::error::Result;
use crate::notify::NotificationBus;
use crate::redact::RedactionPolicy;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

#[cfg(feature = "metrics")]
use crate::metrics::MonitorMetrics;

/// Builder for constructing a `SettingsMonitor` instance.
///
/// # Examples
///
/// ```rust
/// use settings_monitor::prelude::*;
/// use serde_json::json;
///
/// # fn main() -> Result<()> {
/// let monitor = SettingsMonitor::builder()
///     .with_slot(SlotName::default(), json!({ "TenantId": "1" }))
///     .with_slot("TenantName", json!({ "TenantId": "2" }))
///     .with_redacted_field("ConnectionString")
///     .build()?;
///
/// assert_eq!(monitor.slots().len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct SettingsMonitorBuilder<T> {
    fingerprinter: Arc<dyn Fingerprinter>,
    redaction: RedactionPolicy,
    seeds: Vec<(SlotName, T)>,
    #[cfg(feature = "metrics")]
    metrics: Option<MonitorMetrics>,
}

impl<T> SettingsMonitorBuilder<T>
where
    T: Serialize + Send + Sync + 'static,
{
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            fingerprinter: Arc::new(Sha256Fingerprinter),
            redaction: RedactionPolicy::new(),
            seeds: Vec::new(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Replace the default SHA-256 fingerprinter.
    pub fn with_fingerprinter<F: Fingerprinter + 'static>(mut self, fingerprinter: F) -> Self {
        self.fingerprinter = Arc::new(fingerprinter);
        self
    }

    /// Use a complete redaction policy for summaries and log output.
    pub fn with_redaction(mut self, policy: RedactionPolicy) -> Self {
        self.redaction = policy;
        self
    }

    /// Redact one more field name in summaries and log output.
    pub fn with_redacted_field(mut self, name: impl AsRef<str>) -> Self {
        self.redaction.add_field(name);
        self
    }

    /// Seed a slot with its startup value.
    ///
    /// Seeded slots start out tracked without a notification, so the first
    /// live reload is compared against this value. If the same slot is seeded
    /// twice, the first value wins.
    pub fn with_slot(mut self, slot: impl Into<SlotName>, value: T) -> Self {
        self.seeds.push((slot.into(), value));
        self
    }

    /// Record reload metrics with the given meter.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(MonitorMetrics::new(meter));
        self
    }

    /// Build the monitor and seed the configured slots.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::SourceFault`](crate::error::MonitorError::SourceFault)
    /// if a seed value cannot be fingerprinted.
    pub fn build(mut self) -> Result<SettingsMonitor<T>> {
        let seeds = std::mem::take(&mut self.seeds);
        let monitor = SettingsMonitor::from_inner(self.into_inner());

        for (slot, value) in seeds {
            monitor.seed(slot, value)?;
        }

        Ok(monitor)
    }

    pub(crate) fn into_inner(self) -> MonitorInner<T> {
        let faults = FaultReporter::new();
        #[cfg(feature = "metrics")]
        let faults = match &self.metrics {
            Some(metrics) => faults.with_metrics(metrics.clone()),
            None => faults,
        };

        MonitorInner {
            registry: SlotRegistry::new(),
            detector: ChangeDetector::new(self.fingerprinter),
            bus: NotificationBus::with_faults(faults),
            redaction: self.redaction,
            closed: AtomicBool::new(false),
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
        }
    }
}

impl<T> Default for SettingsMonitorBuilder<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
