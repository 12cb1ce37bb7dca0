//! The settings monitor: per-slot change detection and publication.

use crate::core::builder::SettingsMonitorBuilder;
use crate::core::detector::{ChangeDescription, ChangeDetector, ChangeVerdict};
use crate::core::fault::FaultKind;
use crate::core::fingerprint::Fingerprint;
use crate::core::slot::{SlotFilter, SlotName};
use crate::core::state::{SlotRegistry, SlotState};
use crate::core::MonitorFault;
use crate::error::{MonitorError, Result};
use crate::notify::{NotificationBus, Subscription, SubscriptionHandle};
use crate::redact::RedactionPolicy;
use crate::sources::ConfigSource;
use chrono::Utc;
use serde::Serialize;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

#[cfg(feature = "metrics")]
use crate::metrics::MonitorMetrics;

/// Result of handing a reload to [`SettingsMonitor::on_reload`].
#[derive(Debug, Clone)]
pub enum ReloadOutcome {
    /// The candidate matched the published state; nothing happened.
    Unchanged,
    /// The candidate was published and subscribers were notified.
    Changed(Arc<ChangeDescription>),
}

impl ReloadOutcome {
    /// Whether the reload published a change.
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }

    /// The published change, if any.
    pub fn description(&self) -> Option<&Arc<ChangeDescription>> {
        match self {
            Self::Changed(description) => Some(description),
            Self::Unchanged => None,
        }
    }
}

/// Answer to a client polling with the last fingerprint it has seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResult {
    /// Whether the slot differs from what the client has seen
    pub changed: bool,
    /// Human-readable summary, empty when nothing changed
    pub message: String,
    /// Current fingerprint of the slot, `None` while the slot is unseen
    pub fingerprint: Option<Fingerprint>,
}

pub(crate) struct MonitorInner<T> {
    pub(crate) registry: SlotRegistry<T>,
    pub(crate) detector: ChangeDetector,
    pub(crate) bus: NotificationBus,
    pub(crate) redaction: RedactionPolicy,
    pub(crate) closed: AtomicBool,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<MonitorMetrics>,
}

/// Tracks the current value of every configuration slot and announces
/// meaningful changes exactly once.
///
/// Raw reload events go in through [`on_reload`](Self::on_reload). A reload
/// whose fingerprint matches the published state is absorbed; anything else is
/// published atomically and then delivered to subscribers. Reads are lock-free
/// and may run concurrently with reloads of any slot.
///
/// The monitor is a cheap handle: clones share the same state.
///
/// # Examples
///
/// ```rust
/// use serde::Serialize;
/// use settings_monitor::prelude::*;
///
/// #[derive(Debug, Clone, Serialize)]
/// #[serde(rename_all = "PascalCase")]
/// struct AzureSettings {
///     connection_string: String,
///     tenant_id: String,
/// }
///
/// # fn main() -> Result<()> {
/// let monitor = SettingsMonitor::builder()
///     .with_slot(
///         SlotName::default(),
///         AzureSettings { connection_string: "x".into(), tenant_id: "1".into() },
///     )
///     .build()?;
///
/// // The provider re-fires with identical content: nothing happens.
/// let outcome = monitor.on_reload(
///     SlotName::default(),
///     AzureSettings { connection_string: "x".into(), tenant_id: "1".into() },
/// )?;
/// assert!(!outcome.is_changed());
///
/// // A real edit is published.
/// let outcome = monitor.on_reload(
///     SlotName::default(),
///     AzureSettings { connection_string: "y".into(), tenant_id: "1".into() },
/// )?;
/// assert!(outcome.is_changed());
/// assert_eq!(monitor.current("").unwrap().connection_string, "y");
/// # Ok(())
/// # }
/// ```
pub struct SettingsMonitor<T> {
    inner: Arc<MonitorInner<T>>,
}

impl<T> SettingsMonitor<T>
where
    T: Serialize + Send + Sync + 'static,
{
    /// Create a monitor with default options and no seeded slots.
    pub fn new() -> Self {
        Self::from_inner(SettingsMonitorBuilder::new().into_inner())
    }

    /// Create a builder for configuring a monitor.
    pub fn builder() -> SettingsMonitorBuilder<T> {
        SettingsMonitorBuilder::new()
    }

    pub(crate) fn from_inner(inner: MonitorInner<T>) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Handle a raw reload event from the source.
    ///
    /// The first reload of an unseen slot is always a change. Later reloads
    /// are compared against the published state by fingerprint; identical
    /// values are absorbed without touching state or notifying anyone.
    /// Otherwise the new state is published and then the change is delivered
    /// to matching subscribers.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::SourceFault`] if the value cannot be fingerprinted
    /// - [`MonitorError::ConsistencyFault`] if fingerprint and fields disagree
    /// - [`MonitorError::ShutDown`] after [`shutdown`](Self::shutdown)
    ///
    /// In every error case the previously published state is kept.
    pub fn on_reload(&self, slot: impl Into<SlotName>, value: T) -> Result<ReloadOutcome> {
        let slot = slot.into();
        if self.is_shut_down() {
            return Err(MonitorError::ShutDown);
        }

        #[cfg(feature = "metrics")]
        let timer = self.inner.metrics.as_ref().map(|m| m.start_reload());

        let observation = self
            .inner
            .detector
            .observe(&value)
            .map_err(|err| self.reject(&slot, err))?;

        let outcome = self.inner.registry.update(&slot, |writer| -> Result<ReloadOutcome> {
            if self.is_shut_down() {
                return Err(MonitorError::ShutDown);
            }

            let current = writer.current();
            let verdict = self
                .inner
                .detector
                .compare(&slot, current.as_deref(), &observation)?;

            let ChangeVerdict::Changed(description) = verdict else {
                return Ok(ReloadOutcome::Unchanged);
            };

            let description = Arc::new(description);
            let version = current.as_ref().map_or(1, |state| state.version() + 1);
            writer.replace(SlotState::new(
                Arc::new(value),
                observation,
                description.timestamp(),
                version,
                Some(Arc::clone(&description)),
            ));
            self.inner.bus.publish(&description);
            Ok(ReloadOutcome::Changed(description))
        });

        match &outcome {
            Ok(ReloadOutcome::Unchanged) => {
                tracing::debug!(slot = %slot, "reload left settings unchanged");
            }
            Ok(ReloadOutcome::Changed(description)) => {
                tracing::info!(
                    slot = %slot,
                    fingerprint = %description.fingerprint().short(),
                    "{}",
                    description.summary(&self.inner.redaction)
                );
            }
            Err(err @ MonitorError::ConsistencyFault { .. }) => {
                self.inner
                    .bus
                    .fault_reporter()
                    .report(FaultKind::Consistency, Some(&slot), err.to_string());
            }
            Err(_) => {}
        }

        #[cfg(feature = "metrics")]
        self.record_reload_metrics(&outcome, timer);

        outcome
    }

    /// Publish an initial value for an unseen slot without notifying anyone.
    ///
    /// Returns `false` and leaves the slot alone if it is already tracked.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::SourceFault`] if the value cannot be fingerprinted
    /// - [`MonitorError::ShutDown`] after [`shutdown`](Self::shutdown)
    pub fn seed(&self, slot: impl Into<SlotName>, value: T) -> Result<bool> {
        let slot = slot.into();
        if self.is_shut_down() {
            return Err(MonitorError::ShutDown);
        }

        let observation = self
            .inner
            .detector
            .observe(&value)
            .map_err(|err| self.reject(&slot, err))?;

        let seeded = self.inner.registry.update(&slot, |writer| {
            if writer.current().is_some() {
                return false;
            }
            writer.replace(SlotState::new(Arc::new(value), observation, Utc::now(), 1, None));
            true
        });

        if seeded {
            tracing::debug!(slot = %slot, "seeded settings slot");
        }
        Ok(seeded)
    }

    /// Current value of a slot, `None` while the slot is unseen.
    pub fn current<Q>(&self, slot: &Q) -> Option<Arc<T>>
    where
        SlotName: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state(slot).map(|state| Arc::clone(state.value()))
    }

    /// Current value of the default slot.
    pub fn default_settings(&self) -> Option<Arc<T>> {
        self.current("")
    }

    /// Current fingerprint of a slot, `None` while the slot is unseen.
    pub fn fingerprint<Q>(&self, slot: &Q) -> Option<Fingerprint>
    where
        SlotName: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state(slot).map(|state| state.fingerprint().clone())
    }

    /// Full published state of a slot.
    pub fn state<Q>(&self, slot: &Q) -> Option<Arc<SlotState<T>>>
    where
        SlotName: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.registry.get(slot)
    }

    /// Names of all tracked slots, sorted. The default slot comes first.
    pub fn slots(&self) -> Vec<SlotName> {
        self.inner.registry.tracked()
    }

    /// Compare a client's last seen fingerprint with the current one.
    ///
    /// When the client is exactly one change behind, the message summarises
    /// that change with values redacted per the monitor's policy. Otherwise it
    /// only names the slot. A client without a fingerprint is behind as soon
    /// as the slot is tracked.
    pub fn check_for_update(
        &self,
        slot: impl Into<SlotName>,
        last_seen: Option<&Fingerprint>,
    ) -> PollResult {
        let slot = slot.into();
        let Some(state) = self.state(&slot) else {
            return PollResult {
                changed: false,
                message: String::new(),
                fingerprint: None,
            };
        };

        if last_seen == Some(state.fingerprint()) {
            return PollResult {
                changed: false,
                message: String::new(),
                fingerprint: Some(state.fingerprint().clone()),
            };
        }

        let message = match state.last_change() {
            Some(change) if change.previous_fingerprint() == last_seen => {
                change.summary(&self.inner.redaction)
            }
            _ => format!("{} settings changed", slot),
        };

        PollResult {
            changed: true,
            message,
            fingerprint: Some(state.fingerprint().clone()),
        }
    }

    /// Subscribe to changes as a stream.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn subscribe(&self, filter: impl Into<SlotFilter>) -> Result<Subscription> {
        self.inner.bus.subscribe(filter)
    }

    /// Subscribe a callback, run on its own thread for every matching change.
    ///
    /// Keep the returned handle alive for as long as the subscription should
    /// last; dropping it unsubscribes.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn subscribe_fn<F>(&self, filter: impl Into<SlotFilter>, handler: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&ChangeDescription) + Send + 'static,
    {
        self.inner.bus.subscribe_fn(filter, handler)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.bus.subscriber_count()
    }

    /// Receive source, subscriber and consistency faults.
    pub fn faults(&self) -> broadcast::Receiver<MonitorFault> {
        self.inner.bus.faults()
    }

    /// Connect a configuration source.
    ///
    /// Registers the monitor as the source's reload callback, then seeds every
    /// slot the source knows about with its current value. Slots that were
    /// already tracked keep their state.
    ///
    /// # Errors
    ///
    /// Returns an error if the source refuses the callback or a current value
    /// cannot be read or fingerprinted.
    pub fn attach<S>(&self, source: &S) -> Result<()>
    where
        S: ConfigSource<T> + ?Sized,
    {
        let monitor = self.clone();
        source.on_reload(Arc::new(move |slot: SlotName, value: T| {
            if let Err(err) = monitor.on_reload(slot, value) {
                tracing::trace!(error = %err, "reload not applied");
            }
        }))?;

        for slot in source.slots() {
            let value = source.current_value(&slot)?;
            self.seed(slot, value)?;
        }

        tracing::info!(source = %source.name(), slots = self.slots().len(), "attached settings source");
        Ok(())
    }

    /// Stop accepting reloads and close the notification bus.
    ///
    /// Once this returns no further change is published. Published state
    /// stays readable. Calling it again has no effect.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.bus.close();
        tracing::info!("settings monitor shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Redaction policy applied to summaries.
    pub fn redaction(&self) -> &RedactionPolicy {
        &self.inner.redaction
    }

    fn reject(&self, slot: &SlotName, err: MonitorError) -> MonitorError {
        let err = err.into_source_fault(slot);
        self.inner
            .bus
            .fault_reporter()
            .report(FaultKind::Source, Some(slot), err.to_string());
        err
    }

    #[cfg(feature = "metrics")]
    fn record_reload_metrics(&self, outcome: &Result<ReloadOutcome>, timer: Option<std::time::Instant>) {
        let (Some(metrics), Some(timer)) = (&self.inner.metrics, timer) else {
            return;
        };
        match outcome {
            Ok(ReloadOutcome::Unchanged) => metrics.record_unchanged(timer),
            Ok(ReloadOutcome::Changed(_)) => metrics.record_change(timer),
            Err(_) => {}
        }
    }
}

impl<T> Clone for SettingsMonitor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for SettingsMonitor<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
