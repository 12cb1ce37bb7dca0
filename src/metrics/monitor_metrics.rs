//! Settings monitor metrics using OpenTelemetry.

use crate::core::FaultKind;
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Metrics collector for reload processing.
///
/// # Examples
///
/// ```rust,no_run
/// use settings_monitor::metrics::MonitorMetrics;
/// use opentelemetry::global;
///
/// let metrics = MonitorMetrics::new(global::meter("settings-monitor"));
///
/// let timer = metrics.start_reload();
/// // ... compare and publish ...
/// metrics.record_change(timer);
/// ```
#[derive(Clone)]
pub struct MonitorMetrics {
    reload_attempts: Counter<u64>,
    changes_published: Counter<u64>,
    reloads_unchanged: Counter<u64>,
    faults: Counter<u64>,
    reload_duration: Histogram<f64>,
    change_age_seconds: Gauge<i64>,
    active_subscribers: Gauge<i64>,
    subscribers_recorded: Arc<AtomicI64>,
    last_change: Arc<parking_lot::Mutex<Instant>>,
}

impl MonitorMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let reload_attempts = meter
            .u64_counter("settings_monitor.reload.attempts")
            .with_description("Raw reload events received from sources")
            .build();

        let changes_published = meter
            .u64_counter("settings_monitor.changes.published")
            .with_description("Reloads that produced a change notification")
            .build();

        let reloads_unchanged = meter
            .u64_counter("settings_monitor.reload.unchanged")
            .with_description("Reloads absorbed because the fingerprint did not change")
            .build();

        let faults = meter
            .u64_counter("settings_monitor.faults")
            .with_description("Source, subscriber and consistency faults")
            .build();

        let reload_duration = meter
            .f64_histogram("settings_monitor.reload.duration")
            .with_description("Duration of reload processing in seconds")
            .with_unit("s")
            .build();

        let change_age_seconds = meter
            .i64_gauge("settings_monitor.change.age")
            .with_description("Time since the last published change in seconds")
            .with_unit("s")
            .build();

        let active_subscribers = meter
            .i64_gauge("settings_monitor.subscribers.active")
            .with_description("Number of active subscribers")
            .build();

        Self {
            reload_attempts,
            changes_published,
            reloads_unchanged,
            faults,
            reload_duration,
            change_age_seconds,
            active_subscribers,
            subscribers_recorded: Arc::new(AtomicI64::new(0)),
            last_change: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    /// Count a reload attempt and start its timer.
    pub fn start_reload(&self) -> Instant {
        self.reload_attempts.add(1, &[]);
        Instant::now()
    }

    /// Record a reload that published a change.
    pub fn record_change(&self, start: Instant) {
        self.changes_published.add(1, &[]);
        self.reload_duration.record(start.elapsed().as_secs_f64(), &[]);
        *self.last_change.lock() = Instant::now();
    }

    /// Record a reload absorbed as a no-op.
    pub fn record_unchanged(&self, start: Instant) {
        self.reloads_unchanged.add(1, &[]);
        self.reload_duration.record(start.elapsed().as_secs_f64(), &[]);
    }

    /// Record a fault of the given kind.
    pub fn record_fault(&self, kind: FaultKind) {
        self.faults.add(1, &[KeyValue::new("kind", kind.as_str())]);
    }

    /// Update the number of active subscribers.
    pub fn update_subscriber_count(&self, count: i64) {
        self.subscribers_recorded.store(count, Ordering::Relaxed);
        self.active_subscribers.record(count, &[]);
    }

    /// Subscriber count most recently recorded.
    pub fn subscriber_count(&self) -> i64 {
        self.subscribers_recorded.load(Ordering::Relaxed)
    }

    /// Update the change age gauge. Call periodically.
    pub fn update_change_age(&self) {
        let age_secs = self.last_change.lock().elapsed().as_secs() as i64;
        self.change_age_seconds.record(age_secs, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::global;

    #[test]
    fn test_metrics_operations() {
        let metrics = MonitorMetrics::new(global::meter("test"));

        let timer = metrics.start_reload();
        metrics.record_change(timer);

        let timer = metrics.start_reload();
        metrics.record_unchanged(timer);

        metrics.record_fault(FaultKind::Source);
        metrics.record_fault(FaultKind::Subscriber);
        metrics.update_subscriber_count(3);
        assert_eq!(metrics.clone().subscriber_count(), 3);
        metrics.update_change_age();
    }

    #[test]
    fn test_metrics_clone_shares_age() {
        let metrics = MonitorMetrics::new(global::meter("test"));
        let metrics2 = metrics.clone();

        let timer = metrics2.start_reload();
        metrics2.record_change(timer);

        assert!(metrics.last_change.lock().elapsed().as_secs() < 5);
    }
}
