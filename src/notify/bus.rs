//! In-process fan-out of change descriptions to subscribers.

use crate::core::fault::FaultReporter;
use crate::core::{ChangeDescription, FaultKind, MonitorFault, SlotFilter};
use crate::error::{MonitorError, Result};
#[cfg(feature = "metrics")]
use crate::metrics::MonitorMetrics;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tokio::sync::{broadcast, mpsc};

type Sender = mpsc::UnboundedSender<Arc<ChangeDescription>>;

struct Subscriber {
    id: u64,
    filter: SlotFilter,
    tx: Sender,
}

/// Internal bus state.
struct BusInner {
    subscribers: Vec<Subscriber>,
    next_id: u64,
    closed: bool,
    #[cfg(feature = "metrics")]
    metrics: Option<MonitorMetrics>,
}

impl BusInner {
    /// Publish the live subscriber count to the gauge.
    fn record_count(&self) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.update_subscriber_count(self.subscribers.len() as i64);
        }
    }
}

/// Handle for a subscription that can be dropped to unsubscribe.
///
/// When the handle is dropped, the subscription is removed and its queue is
/// closed. Descriptions already queued are still delivered.
pub struct SubscriptionHandle {
    id: u64,
    registry: Arc<RwLock<BusInner>>,
}

impl SubscriptionHandle {
    /// Identifier of this subscription, unique per bus.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let id = self.id;
        let mut inner = self.registry.write();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|sub| sub.id != id);
        if inner.subscribers.len() != before {
            inner.record_count();
        }
    }
}

/// A stream of change descriptions matching a filter.
///
/// Descriptions arrive in publish order. `recv` returns `None` once the bus is
/// closed and the queue has been drained.
pub struct Subscription {
    handle: SubscriptionHandle,
    rx: mpsc::UnboundedReceiver<Arc<ChangeDescription>>,
}

impl Subscription {
    /// Wait for the next change.
    pub async fn recv(&mut self) -> Option<Arc<ChangeDescription>> {
        self.rx.recv().await
    }

    /// Take the next queued change without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<ChangeDescription>> {
        self.rx.try_recv().ok()
    }

    /// Block the current thread until the next change.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_recv(&mut self) -> Option<Arc<ChangeDescription>> {
        self.rx.blocking_recv()
    }

    /// Identifier of this subscription.
    pub fn id(&self) -> u64 {
        self.handle.id
    }
}

/// Registry of change subscribers for one monitor.
///
/// Publishing only enqueues: every subscriber owns an unbounded queue, and
/// callback subscribers drain theirs on a dedicated thread. A slow or
/// panicking handler therefore never stalls the publisher or other
/// subscribers.
///
/// # Examples
///
/// ```rust
/// use settings_monitor::core::SlotFilter;
/// use settings_monitor::notify::NotificationBus;
///
/// let bus = NotificationBus::new();
/// let mut tenant = bus.subscribe(SlotFilter::slot("TenantName")).unwrap();
///
/// assert_eq!(bus.subscriber_count(), 1);
/// assert!(tenant.try_recv().is_none());
/// ```
#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<RwLock<BusInner>>,
    faults: FaultReporter,
}

impl NotificationBus {
    /// Create a new bus.
    pub fn new() -> Self {
        Self::with_faults(FaultReporter::new())
    }

    pub(crate) fn with_faults(faults: FaultReporter) -> Self {
        Self {
            inner: Arc::new(RwLock::new(BusInner {
                subscribers: Vec::new(),
                next_id: 0,
                closed: false,
                #[cfg(feature = "metrics")]
                metrics: faults.metrics().cloned(),
            })),
            faults,
        }
    }

    /// Subscribe to changes as a stream.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ShutDown`] if the bus has been closed.
    pub fn subscribe(&self, filter: impl Into<SlotFilter>) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.register(filter.into(), tx)?;
        Ok(Subscription { handle, rx })
    }

    /// Subscribe a callback.
    ///
    /// The handler runs on a dedicated thread, once per matching change, in
    /// publish order. A panic inside the handler is caught and reported as a
    /// subscriber fault; later changes are still delivered. Dropping the
    /// returned handle unsubscribes.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ShutDown`] if the bus has been closed, or an IO
    /// error if the dispatch thread cannot be spawned.
    pub fn subscribe_fn<F>(&self, filter: impl Into<SlotFilter>, handler: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&ChangeDescription) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<ChangeDescription>>();
        let handle = self.register(filter.into(), tx)?;
        let faults = self.faults.clone();

        thread::Builder::new()
            .name(format!("settings-subscriber-{}", handle.id))
            .spawn(move || {
                while let Some(description) = rx.blocking_recv() {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&description)));
                    if let Err(payload) = outcome {
                        faults.report(
                            FaultKind::Subscriber,
                            Some(description.slot()),
                            format!("subscriber handler panicked: {}", panic_message(payload.as_ref())),
                        );
                    }
                }
            })?;

        Ok(handle)
    }

    /// Remove a subscription. Equivalent to dropping the handle.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        drop(handle);
    }

    /// Deliver a change to every live subscriber whose filter matches.
    ///
    /// Returns the number of subscribers the change was queued for. Never
    /// blocks on subscriber work and never fails.
    pub fn publish(&self, description: &Arc<ChangeDescription>) -> usize {
        let inner = self.inner.read();
        if inner.closed {
            return 0;
        }

        inner
            .subscribers
            .iter()
            .filter(|sub| sub.filter.matches(description.slot()))
            .filter(|sub| sub.tx.send(Arc::clone(description)).is_ok())
            .count()
    }

    /// Close the bus.
    ///
    /// Once this returns no further change is queued. Subscribers drain what
    /// was already queued and then see their stream end.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        inner.closed = true;
        inner.subscribers.clear();
        inner.record_count();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }

    /// Receive faults raised by subscriber handlers and by the monitor.
    pub fn faults(&self) -> broadcast::Receiver<MonitorFault> {
        self.faults.subscribe()
    }

    pub(crate) fn fault_reporter(&self) -> &FaultReporter {
        &self.faults
    }

    fn register(&self, filter: SlotFilter, tx: Sender) -> Result<SubscriptionHandle> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(MonitorError::ShutDown);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(Subscriber { id, filter, tx });
        inner.record_count();

        Ok(SubscriptionHandle {
            id,
            registry: Arc::clone(&self.inner),
        })
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
