//! Non-fatal faults raised while observing reloads or delivering changes.

use crate::core::slot::SlotName;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast;

#[cfg(feature = "metrics")]
use crate::metrics::MonitorMetrics;

const FAULT_CHANNEL_CAPACITY: usize = 64;

/// Category of a [`MonitorFault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FaultKind {
    /// The source delivered a value that could not be fingerprinted.
    Source,
    /// A subscriber handler panicked.
    Subscriber,
    /// Fingerprints disagreed with field comparison.
    Consistency,
}

impl FaultKind {
    /// Stable lowercase label, used for log fields and metric attributes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Subscriber => "subscriber",
            Self::Consistency => "consistency",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fault reported on the monitor's fault channel.
///
/// Faults never stop the monitor: the last good state of every slot keeps
/// being served.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorFault {
    /// What went wrong
    pub kind: FaultKind,
    /// Slot involved, if any
    pub slot: Option<SlotName>,
    /// Diagnostic message
    pub message: String,
    /// When the fault was reported
    pub timestamp: DateTime<Utc>,
}

/// Logs faults and fans them out to fault channel receivers.
#[derive(Clone)]
pub(crate) struct FaultReporter {
    tx: broadcast::Sender<MonitorFault>,
    #[cfg(feature = "metrics")]
    metrics: Option<MonitorMetrics>,
}

impl FaultReporter {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = broadcast::channel(FAULT_CHANNEL_CAPACITY);
        Self {
            tx,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: MonitorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn metrics(&self) -> Option<&MonitorMetrics> {
        self.metrics.as_ref()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<MonitorFault> {
        self.tx.subscribe()
    }

    pub(crate) fn report(&self, kind: FaultKind, slot: Option<&SlotName>, message: impl Into<String>) {
        let fault = MonitorFault {
            kind,
            slot: slot.cloned(),
            message: message.into(),
            timestamp: Utc::now(),
        };

        let slot_label = fault.slot.as_ref().map(ToString::to_string).unwrap_or_default();
        match kind {
            FaultKind::Consistency => tracing::error!(
                kind = %kind,
                slot = %slot_label,
                "{}",
                fault.message
            ),
            FaultKind::Source | FaultKind::Subscriber => tracing::warn!(
                kind = %kind,
                slot = %slot_label,
                "{}",
                fault.message
            ),
        }

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_fault(kind);
        }

        // No receivers is fine: the fault has been logged.
        let _ = self.tx.send(fault);
    }
}
