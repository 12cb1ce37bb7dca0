//! Masking of sensitive field values in change summaries and log output.
//!
//! Change descriptions carry raw values for programmatic consumers. Anything
//! rendered for humans (log lines, poll messages) goes through a
//! [`RedactionPolicy`] first.

use serde_json::Value;
use std::collections::HashSet;

/// Replacement text for redacted values.
pub const MASK: &str = "***";

/// Set of field names whose values must never be rendered.
///
/// Names are matched case-insensitively against the last segment of a field
/// path, so `ConnectionString` covers both `ConnectionString` and
/// `Database.ConnectionString`.
///
/// # Examples
///
/// ```rust
/// use settings_monitor::redact::RedactionPolicy;
/// use serde_json::json;
///
/// let policy = RedactionPolicy::new().with_field("GraphClientSecret");
/// assert_eq!(policy.render("Graph.GraphClientSecret", Some(&json!("s3cr3t"))), "***");
/// assert_eq!(policy.render("TenantId", Some(&json!("1"))), "\"1\"");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RedactionPolicy {
    fields: HashSet<String>,
}

impl RedactionPolicy {
    /// A policy that redacts nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy covering the usual credential-bearing field names.
    pub fn secrets() -> Self {
        ["ConnectionString", "ClientSecret", "GraphClientSecret", "Password", "ApiKey"]
            .into_iter()
            .fold(Self::new(), Self::with_field)
    }

    /// Add a field name to redact.
    pub fn with_field(mut self, name: impl AsRef<str>) -> Self {
        self.add_field(name);
        self
    }

    /// Add a field name to redact in place.
    pub fn add_field(&mut self, name: impl AsRef<str>) {
        self.fields.insert(name.as_ref().to_ascii_lowercase());
    }

    /// Whether no field is redacted.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the value at `path` must be masked.
    pub fn is_redacted(&self, path: &str) -> bool {
        !self.fields.is_empty() && self.fields.contains(&last_segment(path).to_ascii_lowercase())
    }

    /// Render a field value for human consumption.
    ///
    /// Absent values render as `<unset>`, redacted ones as [`MASK`], and the
    /// rest as compact JSON.
    pub fn render(&self, path: &str, value: Option<&Value>) -> String {
        match value {
            None => "<unset>".to_string(),
            Some(_) if self.is_redacted(path) => MASK.to_string(),
            Some(value) => value.to_string(),
        }
    }
}

/// Last dot-separated segment of a field path, honouring `\.` escapes.
fn last_segment(path: &str) -> &str {
    let bytes = path.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'.' => {
                start = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    &path[start.min(path.len())..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("TenantId"), "TenantId");
        assert_eq!(last_segment("Graph.ClientSecret"), "ClientSecret");
        assert_eq!(last_segment("a\\.b"), "a\\.b");
        assert_eq!(last_segment("x.a\\.b"), "a\\.b");
    }

    #[test]
    fn test_case_insensitive_match() {
        let policy = RedactionPolicy::new().with_field("connectionstring");
        assert!(policy.is_redacted("ConnectionString"));
        assert!(policy.is_redacted("Db.CONNECTIONSTRING"));
        assert!(!policy.is_redacted("TenantId"));
    }

    #[test]
    fn test_render() {
        let policy = RedactionPolicy::secrets();
        assert_eq!(policy.render("ConnectionString", Some(&json!("Server=db"))), MASK);
        assert_eq!(policy.render("ConnectionString", None), "<unset>");
        assert_eq!(policy.render("UseAdal", Some(&json!(true))), "true");
        assert_eq!(policy.render("TenantName", Some(&json!("contoso"))), "\"contoso\"");
    }

    #[test]
    fn test_empty_policy() {
        let policy = RedactionPolicy::new();
        assert!(policy.is_empty());
        assert!(!policy.is_redacted("ConnectionString"));
    }
}
