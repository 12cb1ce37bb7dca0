//! Change detection between a published slot state and a reload candidate.

use crate::core::fingerprint::{FieldSet, Fingerprint, Fingerprinter, Sha256Fingerprinter};
use crate::core::slot::SlotName;
use crate::core::state::SlotState;
use crate::error::{MonitorError, Result};
use crate::redact::RedactionPolicy;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A candidate value that has been flattened and fingerprinted.
#[derive(Debug, Clone)]
pub struct Observation {
    fields: FieldSet,
    fingerprint: Fingerprint,
}

impl Observation {
    /// Flattened fields of the candidate.
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Fingerprint of the candidate.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub(crate) fn into_parts(self) -> (FieldSet, Fingerprint) {
        (self.fields, self.fingerprint)
    }
}

/// One field that differs between the published state and the candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    /// Dotted field path
    pub field: String,
    /// Previous value, `None` if the field was absent
    pub old: Option<Value>,
    /// New value, `None` if the field was removed
    pub new: Option<Value>,
}

/// What changed in a slot. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeDescription {
    slot: SlotName,
    changes: Vec<FieldChange>,
    previous_fingerprint: Option<Fingerprint>,
    fingerprint: Fingerprint,
    timestamp: DateTime<Utc>,
}

impl ChangeDescription {
    /// Slot the change belongs to.
    pub fn slot(&self) -> &SlotName {
        &self.slot
    }

    /// Differing fields in path order.
    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    /// Names of the differing fields.
    pub fn changed_fields(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|change| change.field.as_str())
    }

    /// Look up the change for a single field.
    pub fn change_for(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|change| change.field == field)
    }

    /// Fingerprint the slot had before this change, `None` on first observation.
    pub fn previous_fingerprint(&self) -> Option<&Fingerprint> {
        self.previous_fingerprint.as_ref()
    }

    /// Fingerprint the slot has after this change.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// When the change was detected.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether this is the first value ever observed for the slot.
    pub fn is_first_observation(&self) -> bool {
        self.previous_fingerprint.is_none()
    }

    /// Human-readable summary including old and new values.
    ///
    /// Values of fields covered by `policy` are masked.
    pub fn summary(&self, policy: &RedactionPolicy) -> String {
        let details: Vec<String> = self
            .changes
            .iter()
            .map(|change| {
                format!(
                    "{} {} -> {}",
                    change.field,
                    policy.render(&change.field, change.old.as_ref()),
                    policy.render(&change.field, change.new.as_ref())
                )
            })
            .collect();

        if details.is_empty() {
            format!("{} settings observed", self.slot)
        } else {
            format!("{} settings changed: {}", self.slot, details.join("; "))
        }
    }
}

/// Lists field names only, never values.
impl fmt::Display for ChangeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} settings changed", self.slot)?;
        let mut fields = self.changed_fields();
        if let Some(first) = fields.next() {
            write!(f, ": {}", first)?;
            for field in fields {
                write!(f, ", {}", field)?;
            }
        }
        Ok(())
    }
}

/// Outcome of comparing a candidate against the published state.
#[derive(Debug, Clone)]
pub enum ChangeVerdict {
    /// Fingerprints match; nothing to publish.
    Unchanged,
    /// The candidate differs from the published state.
    Changed(ChangeDescription),
}

impl ChangeVerdict {
    /// Whether the verdict is [`ChangeVerdict::Changed`].
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Decides whether a reload candidate is a meaningful change.
///
/// # Examples
///
/// ```rust
/// use settings_monitor::core::{ChangeDetector, ChangeVerdict, SlotName};
/// use serde_json::json;
///
/// let detector = ChangeDetector::default();
/// let observation = detector.observe(&json!({ "TenantId": "1" })).unwrap();
///
/// // Nothing published yet: the first observation is always a change.
/// let verdict = detector
///     .compare::<serde_json::Value>(&SlotName::default(), None, &observation)
///     .unwrap();
/// assert!(matches!(verdict, ChangeVerdict::Changed(_)));
/// ```
#[derive(Clone)]
pub struct ChangeDetector {
    fingerprinter: Arc<dyn Fingerprinter>,
}

impl ChangeDetector {
    /// Create a detector using the given fingerprinter.
    pub fn new(fingerprinter: Arc<dyn Fingerprinter>) -> Self {
        Self { fingerprinter }
    }

    /// Flatten and fingerprint a candidate value.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::MalformedSettings`] if the value cannot be flattened.
    pub fn observe<T: Serialize + ?Sized>(&self, candidate: &T) -> Result<Observation> {
        let fields = FieldSet::from_settings(candidate)?;
        let fingerprint = self.fingerprinter.fingerprint(&fields);
        Ok(Observation {
            fields,
            fingerprint,
        })
    }

    /// Compare an observed candidate against the published state of `slot`.
    ///
    /// `None` for `old` means the slot is unseen; every field of the candidate is
    /// then reported with no previous value.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ConsistencyFault`] if the fingerprints differ but
    /// no field does.
    pub fn compare<T>(
        &self,
        slot: &SlotName,
        old: Option<&SlotState<T>>,
        observation: &Observation,
    ) -> Result<ChangeVerdict> {
        let Some(old) = old else {
            let changes = observation
                .fields
                .iter()
                .map(|(field, value)| FieldChange {
                    field: field.to_string(),
                    old: None,
                    new: Some(value.clone()),
                })
                .collect();
            return Ok(ChangeVerdict::Changed(self.describe(slot, None, observation, changes)));
        };

        if old.fingerprint() == &observation.fingerprint {
            return Ok(ChangeVerdict::Unchanged);
        }

        let changes = diff_fields(old.fields(), &observation.fields);
        if changes.is_empty() {
            return Err(MonitorError::ConsistencyFault {
                slot: slot.clone(),
                previous: old.fingerprint().clone(),
                candidate: observation.fingerprint.clone(),
            });
        }

        Ok(ChangeVerdict::Changed(self.describe(
            slot,
            Some(old.fingerprint().clone()),
            observation,
            changes,
        )))
    }

    fn describe(
        &self,
        slot: &SlotName,
        previous_fingerprint: Option<Fingerprint>,
        observation: &Observation,
        changes: Vec<FieldChange>,
    ) -> ChangeDescription {
        ChangeDescription {
            slot: slot.clone(),
            changes,
            previous_fingerprint,
            fingerprint: observation.fingerprint.clone(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(Arc::new(Sha256Fingerprinter))
    }
}

impl fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeDetector").finish_non_exhaustive()
    }
}

/// Every field whose value differs between `old` and `new`, in path order.
///
/// Fields present on only one side are included with `None` on the other.
pub fn diff_fields(old: &FieldSet, new: &FieldSet) -> Vec<FieldChange> {
    let paths: BTreeSet<&str> = old
        .iter()
        .map(|(path, _)| path)
        .chain(new.iter().map(|(path, _)| path))
        .collect();

    paths
        .into_iter()
        .filter_map(|path| {
            let before = old.get(path);
            let after = new.get(path);
            (before != after).then(|| FieldChange {
                field: path.to_string(),
                old: before.cloned(),
                new: after.cloned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seeded(detector: &ChangeDetector, value: Value) -> SlotState<Value> {
        let observation = detector.observe(&value).unwrap();
        SlotState::new(Arc::new(value), observation, Utc::now(), 1, None)
    }

    /// Hands out a fresh fingerprint on every call.
    struct NonceFingerprinter(AtomicUsize);

    impl Fingerprinter for NonceFingerprinter {
        fn fingerprint(&self, _fields: &FieldSet) -> Fingerprint {
            Fingerprint::new(format!("nonce-{}", self.0.fetch_add(1, Ordering::SeqCst)))
        }
    }

    #[test]
    fn test_identical_candidate_is_unchanged() {
        let detector = ChangeDetector::default();
        let state = seeded(&detector, json!({ "ConnectionString": "x", "TenantId": "1" }));
        let observation = detector
            .observe(&json!({ "ConnectionString": "x", "TenantId": "1" }))
            .unwrap();

        let verdict = detector
            .compare(&SlotName::default(), Some(&state), &observation)
            .unwrap();
        assert!(!verdict.is_changed());
    }

    #[test]
    fn test_single_field_change() {
        let detector = ChangeDetector::default();
        let state = seeded(&detector, json!({ "ConnectionString": "x", "TenantId": "1" }));
        let observation = detector
            .observe(&json!({ "ConnectionString": "y", "TenantId": "1" }))
            .unwrap();

        let ChangeVerdict::Changed(description) = detector
            .compare(&SlotName::default(), Some(&state), &observation)
            .unwrap()
        else {
            panic!("expected a change");
        };

        assert_eq!(
            description.changes(),
            &[FieldChange {
                field: "ConnectionString".to_string(),
                old: Some(json!("x")),
                new: Some(json!("y")),
            }]
        );
        assert_eq!(description.previous_fingerprint(), Some(state.fingerprint()));
        assert_eq!(description.fingerprint(), observation.fingerprint());
        assert!(!description.is_first_observation());
    }

    #[test]
    fn test_every_field_is_reported() {
        // Earlier fields differing must not hide later ones.
        let detector = ChangeDetector::default();
        let state = seeded(&detector, json!({ "A": 1, "B": 2, "C": 3 }));
        let observation = detector.observe(&json!({ "A": 10, "B": 2, "C": 30 })).unwrap();

        let ChangeVerdict::Changed(description) = detector
            .compare(&SlotName::new("TenantName"), Some(&state), &observation)
            .unwrap()
        else {
            panic!("expected a change");
        };
        let fields: Vec<&str> = description.changed_fields().collect();
        assert_eq!(fields, vec!["A", "C"]);
    }

    #[test]
    fn test_added_and_removed_fields() {
        let detector = ChangeDetector::default();
        let state = seeded(&detector, json!({ "Old": "gone", "Kept": 1 }));
        let observation = detector.observe(&json!({ "Kept": 1, "New": "here" })).unwrap();

        let ChangeVerdict::Changed(description) = detector
            .compare(&SlotName::default(), Some(&state), &observation)
            .unwrap()
        else {
            panic!("expected a change");
        };

        let new = description.change_for("New").unwrap();
        assert_eq!(new.old, None);
        assert_eq!(new.new, Some(json!("here")));

        let old = description.change_for("Old").unwrap();
        assert_eq!(old.old, Some(json!("gone")));
        assert_eq!(old.new, None);
    }

    #[test]
    fn test_unseen_slot_reports_all_fields() {
        let detector = ChangeDetector::default();
        let observation = detector
            .observe(&json!({ "ConnectionString": "x", "TenantId": "1" }))
            .unwrap();

        let ChangeVerdict::Changed(description) = detector
            .compare::<Value>(&SlotName::default(), None, &observation)
            .unwrap()
        else {
            panic!("expected a change");
        };

        assert!(description.is_first_observation());
        assert_eq!(description.changes().len(), 2);
        assert!(description.changes().iter().all(|c| c.old.is_none()));
    }

    #[test]
    fn test_fingerprint_defect_is_a_consistency_fault() {
        let detector = ChangeDetector::new(Arc::new(NonceFingerprinter(AtomicUsize::new(0))));
        let state = seeded(&detector, json!({ "TenantId": "1" }));
        let observation = detector.observe(&json!({ "TenantId": "1" })).unwrap();

        let err = detector
            .compare(&SlotName::default(), Some(&state), &observation)
            .unwrap_err();
        assert!(matches!(err, MonitorError::ConsistencyFault { .. }));
    }

    #[test]
    fn test_summary_and_display() {
        let detector = ChangeDetector::default();
        let state = seeded(&detector, json!({ "ConnectionString": "x", "TenantId": "1" }));
        let observation = detector
            .observe(&json!({ "ConnectionString": "y", "TenantId": "2" }))
            .unwrap();
        let ChangeVerdict::Changed(description) = detector
            .compare(&SlotName::new("TenantName"), Some(&state), &observation)
            .unwrap()
        else {
            panic!("expected a change");
        };

        assert_eq!(
            description.to_string(),
            "TenantName settings changed: ConnectionString, TenantId"
        );
        assert_eq!(
            description.summary(&RedactionPolicy::secrets()),
            "TenantName settings changed: ConnectionString *** -> ***; TenantId \"1\" -> \"2\""
        );
    }
}
