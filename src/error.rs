//! Error types for settings-monitor.

use crate::core::{Fingerprint, SlotName};

/// Result type alias for settings-monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur while loading, observing or publishing settings.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Failed to load configuration from a source.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// Failed to deserialize a configuration section into the settings type.
    #[error("Failed to deserialize configuration: {0}")]
    DeserializationError(String),

    /// File watching is not supported or failed to initialize.
    #[error("File watching error: {0}")]
    WatchError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A settings value could not be flattened into comparable fields.
    #[error("Malformed settings value: {reason}")]
    MalformedSettings {
        /// Why the value was rejected
        reason: String,
    },

    /// The source delivered a value for a slot that could not be fingerprinted.
    ///
    /// The previous state of the slot is retained.
    #[error("Rejected reload for slot {slot}: {reason}")]
    SourceFault {
        /// Slot the reload was addressed to
        slot: SlotName,
        /// Why the candidate was rejected
        reason: String,
    },

    /// Fingerprints differ although every field compares equal.
    ///
    /// This is a defect in the fingerprinter, never a property of the input.
    #[error(
        "Fingerprint mismatch without field differences for slot {slot} ({previous} -> {candidate})"
    )]
    ConsistencyFault {
        /// Slot being compared
        slot: SlotName,
        /// Fingerprint of the published state
        previous: Fingerprint,
        /// Fingerprint of the rejected candidate
        candidate: Fingerprint,
    },

    /// The requested slot is not provided by the source.
    #[error("Unknown slot: {0}")]
    UnknownSlot(SlotName),

    /// The monitor has been shut down and accepts no further reloads.
    #[error("Settings monitor has been shut down")]
    ShutDown,
}

impl MonitorError {
    /// Create a malformed settings error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSettings {
            reason: reason.into(),
        }
    }

    /// Attribute a malformed value to the slot it was delivered for.
    pub(crate) fn into_source_fault(self, slot: &SlotName) -> Self {
        match self {
            Self::MalformedSettings { reason } => Self::SourceFault {
                slot: slot.clone(),
                reason,
            },
            other => Self::SourceFault {
                slot: slot.clone(),
                reason: other.to_string(),
            },
        }
    }
}
