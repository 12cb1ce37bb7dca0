//! Per-slot published state and the registry holding it.

use crate::core::detector::{ChangeDescription, Observation};
use crate::core::fingerprint::{FieldSet, Fingerprint};
use crate::core::slot::SlotName;
use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// The value currently published for a slot, together with its fingerprint.
///
/// A `SlotState` is built once and published as a whole, so a reader always
/// sees a value and the fingerprint computed from that very value.
#[derive(Debug)]
pub struct SlotState<T> {
    value: Arc<T>,
    fields: FieldSet,
    fingerprint: Fingerprint,
    last_updated: DateTime<Utc>,
    version: u64,
    last_change: Option<Arc<ChangeDescription>>,
}

impl<T> SlotState<T> {
    pub(crate) fn new(
        value: Arc<T>,
        observation: Observation,
        last_updated: DateTime<Utc>,
        version: u64,
        last_change: Option<Arc<ChangeDescription>>,
    ) -> Self {
        let (fields, fingerprint) = observation.into_parts();
        Self {
            value,
            fields,
            fingerprint,
            last_updated,
            version,
            last_change,
        }
    }

    /// The published settings value.
    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    /// Flattened fields of the published value.
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Fingerprint of the published value.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// When this state was published.
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Number of states published for the slot so far, starting at 1.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The change that produced this state. `None` for seeded states.
    pub fn last_change(&self) -> Option<&Arc<ChangeDescription>> {
        self.last_change.as_ref()
    }
}

struct SlotCell<T> {
    state: ArcSwapOption<SlotState<T>>,
    write: Mutex<()>,
}

impl<T> SlotCell<T> {
    fn new() -> Self {
        Self {
            state: ArcSwapOption::empty(),
            write: Mutex::new(()),
        }
    }
}

/// Exclusive write access to one slot.
///
/// Only obtainable through [`SlotRegistry::update`], which holds the slot's
/// write lock for the writer's whole lifetime.
pub(crate) struct SlotWriter<'a, T> {
    cell: &'a SlotCell<T>,
}

impl<T> SlotWriter<'_, T> {
    /// State published right now.
    pub(crate) fn current(&self) -> Option<Arc<SlotState<T>>> {
        self.cell.state.load_full()
    }

    /// Atomically publish a new state.
    pub(crate) fn replace(&self, state: SlotState<T>) -> Arc<SlotState<T>> {
        let state = Arc::new(state);
        self.cell.state.store(Some(Arc::clone(&state)));
        state
    }
}

/// Registry of slot states.
///
/// Reads never take a lock. Writes to one slot are serialized by that slot's
/// own mutex; different slots never contend. The slot map is copied on write
/// when a slot is seen for the first time.
pub(crate) struct SlotRegistry<T> {
    slots: ArcSwap<HashMap<SlotName, Arc<SlotCell<T>>>>,
    insert: Mutex<()>,
}

impl<T> SlotRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: ArcSwap::from_pointee(HashMap::new()),
            insert: Mutex::new(()),
        }
    }

    /// Published state of `slot`, `None` while the slot is unseen.
    pub(crate) fn get<Q>(&self, slot: &Q) -> Option<Arc<SlotState<T>>>
    where
        SlotName: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.slots
            .load()
            .get(slot)
            .and_then(|cell| cell.state.load_full())
    }

    /// Names of all slots with a published state, sorted.
    pub(crate) fn tracked(&self) -> Vec<SlotName> {
        let slots = self.slots.load();
        let mut names: Vec<SlotName> = slots
            .iter()
            .filter(|(_, cell)| cell.state.load().is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Run `f` with exclusive write access to `slot`.
    pub(crate) fn update<R>(&self, slot: &SlotName, f: impl FnOnce(SlotWriter<'_, T>) -> R) -> R {
        let cell = self.cell(slot);
        let _guard = cell.write.lock();
        f(SlotWriter { cell: &cell })
    }

    fn cell(&self, slot: &SlotName) -> Arc<SlotCell<T>> {
        if let Some(cell) = self.slots.load().get(slot) {
            return Arc::clone(cell);
        }

        let _guard = self.insert.lock();
        let current = self.slots.load_full();
        if let Some(cell) = current.get(slot) {
            return Arc::clone(cell);
        }

        let cell = Arc::new(SlotCell::new());
        let mut next: HashMap<SlotName, Arc<SlotCell<T>>> = (*current).clone();
        next.insert(slot.clone(), Arc::clone(&cell));
        self.slots.store(Arc::new(next));
        cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::detector::ChangeDetector;
    use serde_json::{Value, json};
    use std::thread;

    fn state(detector: &ChangeDetector, value: Value, version: u64) -> SlotState<Value> {
        let observation = detector.observe(&value).unwrap();
        SlotState::new(Arc::new(value), observation, Utc::now(), version, None)
    }

    #[test]
    fn test_unseen_slot_is_none() {
        let registry: SlotRegistry<Value> = SlotRegistry::new();
        assert!(registry.get(&SlotName::default()).is_none());
        assert!(registry.tracked().is_empty());
    }

    #[test]
    fn test_replace_is_visible() {
        let detector = ChangeDetector::default();
        let registry = SlotRegistry::new();
        let slot = SlotName::new("TenantName");

        registry.update(&slot, |writer| {
            assert!(writer.current().is_none());
            writer.replace(state(&detector, json!({ "TenantId": "1" }), 1));
        });

        let published = registry.get(&slot).unwrap();
        assert_eq!(**published.value(), json!({ "TenantId": "1" }));
        assert_eq!(published.version(), 1);
        assert_eq!(registry.tracked(), vec![slot]);
    }

    #[test]
    fn test_slots_are_independent() {
        let detector = ChangeDetector::default();
        let registry = SlotRegistry::new();
        let default = SlotName::default();
        let tenant = SlotName::new("TenantName");

        registry.update(&default, |writer| {
            writer.replace(state(&detector, json!({ "TenantId": "d" }), 1));
        });
        registry.update(&tenant, |writer| {
            writer.replace(state(&detector, json!({ "TenantId": "t" }), 1));
        });

        assert_eq!(**registry.get(&default).unwrap().value(), json!({ "TenantId": "d" }));
        assert_eq!(**registry.get(&tenant).unwrap().value(), json!({ "TenantId": "t" }));
        assert_eq!(registry.tracked(), vec![default, tenant]);
    }

    #[test]
    fn test_concurrent_writers_never_tear() {
        let registry: Arc<SlotRegistry<Value>> = Arc::new(SlotRegistry::new());
        let slot = SlotName::default();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let slot = slot.clone();
                thread::spawn(move || {
                    let detector = ChangeDetector::default();
                    for round in 0..50 {
                        let value = json!({ "Writer": i, "Round": round });
                        registry.update(&slot, |writer| {
                            let next = writer.current().map_or(1, |s| s.version() + 1);
                            writer.replace(state(&detector, value, next));
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let published = registry.get(&slot).unwrap();
        assert_eq!(published.version(), 8 * 50);
        let detector = ChangeDetector::default();
        let recomputed = detector.observe(published.value().as_ref()).unwrap();
        assert_eq!(recomputed.fingerprint(), published.fingerprint());
    }
}
