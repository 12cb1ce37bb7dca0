//! Integration tests driving the monitor from settings files.

use serde::{Deserialize, Serialize};
use settings_monitor::prelude::*;
use settings_monitor::sources::SectionSource;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct AzureSettings {
    connection_string: String,
    tenant_id: String,
    #[serde(default)]
    graph: GraphSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct GraphSettings {
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    client_secret: String,
}

fn write_settings(path: &Path, default_conn: &str, tenant_conn: &str) {
    fs::write(
        path,
        format!(
            r#"
azure_settings:
  connection_string: "{default_conn}"
  tenant_id: "1"
  graph:
    client_id: "app"
    client_secret: "hunter2"

tenant_name_azure_settings:
  connection_string: "{tenant_conn}"
  tenant_id: "2"
"#
        ),
    )
    .unwrap();
}

fn section_source(path: &Path) -> SectionSource<AzureSettings> {
    SectionSource::new()
        .with_file(path)
        .with_section("azure_settings", SlotName::default())
        .with_section("tenant_name_azure_settings", "TenantName")
}

#[test]
fn test_attach_seeds_every_section() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("appsettings.yaml");
    write_settings(&path, "a", "t");

    let source = section_source(&path);
    let monitor = SettingsMonitor::new();
    let mut changes = monitor.subscribe(SlotFilter::Any).unwrap();
    monitor.attach(&source).unwrap();

    assert_eq!(monitor.slots(), vec![SlotName::default(), SlotName::new("TenantName")]);
    let settings = monitor.default_settings().unwrap();
    assert_eq!(settings.connection_string, "a");
    assert_eq!(settings.graph.client_id, "app");
    assert_eq!(monitor.current("TenantName").unwrap().tenant_id, "2");
    assert!(changes.try_recv().is_none());
}

#[test]
fn test_identical_rewrite_is_collapsed() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("appsettings.yaml");
    write_settings(&path, "a", "t");

    let source = section_source(&path);
    let monitor = SettingsMonitor::new();
    monitor.attach(&source).unwrap();
    let mut changes = monitor.subscribe(SlotFilter::Any).unwrap();

    // Saving the same content twice fires twice but publishes nothing.
    write_settings(&path, "a", "t");
    assert_eq!(source.reload().unwrap(), 2);
    assert_eq!(source.reload().unwrap(), 2);
    assert!(changes.try_recv().is_none());

    write_settings(&path, "a", "u");
    source.reload().unwrap();

    let change = changes.try_recv().unwrap();
    assert_eq!(change.slot().as_str(), "TenantName");
    assert_eq!(
        change.changed_fields().collect::<Vec<_>>(),
        vec!["connection_string"]
    );
    assert!(changes.try_recv().is_none());
    assert_eq!(monitor.current("TenantName").unwrap().connection_string, "u");
}

#[test]
fn test_nested_secret_is_redacted_in_poll_message() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("appsettings.yaml");
    write_settings(&path, "a", "t");

    let source = section_source(&path);
    let monitor = SettingsMonitor::builder()
        .with_redacted_field("client_secret")
        .build()
        .unwrap();
    monitor.attach(&source).unwrap();
    let seen = monitor.fingerprint("").unwrap();

    fs::write(
        &path,
        fs::read_to_string(&path).unwrap().replace("hunter2", "correct-horse"),
    )
    .unwrap();
    source.reload().unwrap();

    let poll = monitor.check_for_update(SlotName::default(), Some(&seen));
    assert!(poll.changed);
    assert_eq!(poll.message, "<default> settings changed: graph.client_secret *** -> ***");
    assert!(!monitor.check_for_update("TenantName", monitor.fingerprint("TenantName").as_ref()).changed);
}

#[test]
fn test_broken_file_keeps_previous_state() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("appsettings.yaml");
    write_settings(&path, "a", "t");

    let source = section_source(&path);
    let monitor = SettingsMonitor::new();
    monitor.attach(&source).unwrap();

    fs::write(&path, "azure_settings: [unterminated").unwrap();
    assert!(source.reload().is_err());
    assert_eq!(monitor.default_settings().unwrap().connection_string, "a");
}

#[cfg(feature = "file-watch")]
#[tokio::test]
async fn test_file_watch_publishes_edit() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("appsettings.yaml");
    write_settings(&path, "a", "t");

    let source = Arc::new(section_source(&path));
    let monitor = SettingsMonitor::new();
    monitor.attach(source.as_ref()).unwrap();
    let mut changes = monitor.subscribe(SlotName::default()).unwrap();

    let _watcher = source.watch(Duration::from_millis(100)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    write_settings(&path, "b", "t");

    let change = timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("change within timeout")
        .unwrap();
    assert_eq!(change.slot(), &SlotName::default());
    assert_eq!(monitor.default_settings().unwrap().connection_string, "b");
}
