//! Example demonstrating file watching with change detection.
//!
//! This example shows how to:
//! - Map sections of a settings file to slots
//! - Reload automatically when the file changes
//! - Receive one notification per real change, however often the file is saved
//!
//! Run with: cargo run --example hot_reload
//!
//! While running, edit the printed settings file. Saving without changes
//! produces no notification.

use serde::{Deserialize, Serialize};
use settings_monitor::prelude::*;
use settings_monitor::sources::SectionSource;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AzureSettings {
    connection_string: String,
    tenant_id: String,
    client_secret: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings_path = std::env::temp_dir().join("settings-monitor-hot-reload.yaml");
    if !settings_path.exists() {
        std::fs::write(
            &settings_path,
            r#"azure_settings:
  connection_string: "Endpoint=sb://default.example"
  tenant_id: "1"
  client_secret: "change-me"

tenant_name_azure_settings:
  connection_string: "Endpoint=sb://tenant.example"
  tenant_id: "2"
  client_secret: "change-me-too"
"#,
        )?;
    }

    let source = Arc::new(
        SectionSource::<AzureSettings>::new()
            .with_file(&settings_path)
            .with_env_overrides("DEMO", "__")
            .with_section("azure_settings", SlotName::default())
            .with_section("tenant_name_azure_settings", "TenantName"),
    );

    let monitor = SettingsMonitor::builder()
        .with_redaction(RedactionPolicy::secrets().with_field("client_secret"))
        .build()?;
    monitor.attach(source.as_ref())?;

    let _watcher = source.watch(Duration::from_millis(500)).await?;
    let mut changes = monitor.subscribe(SlotFilter::Any)?;

    println!("Watching {}", settings_path.display());
    println!("Press Ctrl+C to exit\n");

    loop {
        tokio::select! {
            change = changes.recv() => {
                let Some(change) = change else { break };
                println!("[change] {}", change.summary(monitor.redaction()));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    monitor.shutdown();
    Ok(())
}
