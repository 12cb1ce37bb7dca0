//! Core settings monitoring types.

mod builder;
mod detector;
pub(crate) mod fault;
mod fingerprint;
mod monitor;
mod slot;
mod state;

pub use builder::SettingsMonitorBuilder;
pub use detector::{ChangeDescription, ChangeDetector, ChangeVerdict, FieldChange, Observation, diff_fields};
pub use fault::{FaultKind, MonitorFault};
pub use fingerprint::{FieldSet, Fingerprint, Fingerprinter, Sha256Fingerprinter, fingerprint_of};
pub use monitor::{PollResult, ReloadOutcome, SettingsMonitor};
pub use slot::{SlotFilter, SlotName};
pub use state::SlotState;
