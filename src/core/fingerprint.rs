//! Settings flattening and fingerprinting.
//!
//! A settings value is serialized through `serde_json` and flattened into a
//! [`FieldSet`]: an ordered map from dotted field paths to leaf values. The
//! field set is the unit of comparison for change detection, and its canonical
//! encoding is what gets hashed into a [`Fingerprint`].

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Flattened, ordered view of a settings value.
///
/// Nested objects are flattened into `Parent.Child` paths. Arrays, scalars and
/// empty objects are leaves. Literal dots and backslashes inside keys are
/// escaped so that `{"a.b": 1}` and `{"a": {"b": 1}}` stay distinct.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: BTreeMap<String, Value>,
}

impl FieldSet {
    /// Flatten a settings value.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::MalformedSettings`] if the value fails to
    /// serialize or does not serialize to a map of fields.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::Serialize;
    /// use settings_monitor::core::FieldSet;
    ///
    /// #[derive(Serialize)]
    /// #[serde(rename_all = "PascalCase")]
    /// struct AzureSettings {
    ///     connection_string: String,
    ///     tenant_id: String,
    /// }
    ///
    /// let fields = FieldSet::from_settings(&AzureSettings {
    ///     connection_string: "x".into(),
    ///     tenant_id: "1".into(),
    /// })
    /// .unwrap();
    /// assert_eq!(fields.len(), 2);
    /// assert_eq!(fields.get("TenantId"), Some(&serde_json::json!("1")));
    /// ```
    pub fn from_settings<T: Serialize + ?Sized>(settings: &T) -> Result<Self> {
        let value = serde_json::to_value(settings)
            .map_err(|e| MonitorError::malformed(format!("failed to serialize settings: {}", e)))?;

        match value {
            Value::Object(map) => {
                let mut fields = BTreeMap::new();
                for (key, value) in map {
                    flatten_into(escape_segment(&key), value, &mut fields);
                }
                Ok(Self { fields })
            }
            other => Err(MonitorError::malformed(format!(
                "settings must serialize to a map of fields, got {}",
                kind_of(&other)
            ))),
        }
    }

    /// Value of a single field path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.fields.get(path)
    }

    /// Iterate fields in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(path, value)| (path.as_str(), value))
    }

    /// Number of leaf fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Canonical, unambiguous byte encoding of the field set.
    ///
    /// Layout: field count, then for each field in path order a length-framed
    /// path followed by the length-framed compact JSON text of the value. All
    /// lengths are `u64` little-endian.
    pub fn encode_canonical(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.fields.len() * 32);
        buf.extend_from_slice(&(self.fields.len() as u64).to_le_bytes());
        for (path, value) in &self.fields {
            write_frame(&mut buf, path.as_bytes());
            write_frame(&mut buf, value.to_string().as_bytes());
        }
        buf
    }
}

fn write_frame(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn flatten_into(path: String, value: Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(format!("{}.{}", path, escape_segment(&key)), child, out);
            }
        }
        leaf => {
            out.insert(path, leaf);
        }
    }
}

fn escape_segment(key: &str) -> String {
    if !key.contains(['.', '\\']) {
        return key.to_string();
    }
    let mut escaped = String::with_capacity(key.len() + 2);
    for ch in key.chars() {
        if ch == '.' || ch == '\\' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Deterministic digest of a settings value.
///
/// Rendered as 64 lowercase hex characters. Two values have equal fingerprints
/// exactly when they are considered identical for change detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed digest string.
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// The digest text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strategy turning a flattened settings value into a fingerprint.
///
/// Implementations must be pure: equal field sets always produce equal
/// fingerprints, and field sets differing in any field should produce
/// different fingerprints with overwhelming probability.
pub trait Fingerprinter: Send + Sync {
    /// Compute the fingerprint of a field set.
    fn fingerprint(&self, fields: &FieldSet) -> Fingerprint;
}

/// SHA-256 over [`FieldSet::encode_canonical`]. The default fingerprinter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Fingerprinter;

impl Fingerprinter for Sha256Fingerprinter {
    fn fingerprint(&self, fields: &FieldSet) -> Fingerprint {
        let digest = Sha256::digest(fields.encode_canonical());
        Fingerprint(format!("{:x}", digest))
    }
}

/// Fingerprint a settings value with the default fingerprinter.
///
/// # Errors
///
/// Returns [`MonitorError::MalformedSettings`] if the value cannot be flattened.
///
/// # Examples
///
/// ```rust
/// use settings_monitor::core::fingerprint_of;
/// use std::collections::BTreeMap;
///
/// let mut settings = BTreeMap::new();
/// settings.insert("TenantId", "1");
///
/// let first = fingerprint_of(&settings).unwrap();
/// let second = fingerprint_of(&settings).unwrap();
/// assert_eq!(first, second);
/// assert_eq!(first.as_str().len(), 64);
/// ```
pub fn fingerprint_of<T: Serialize + ?Sized>(settings: &T) -> Result<Fingerprint> {
    let fields = FieldSet::from_settings(settings)?;
    Ok(Sha256Fingerprinter.fingerprint(&fields))
}
