//! Example of a worker reacting to per-tenant settings changes.
//!
//! This example shows how to:
//! - Attach an in-process source with several slots
//! - Run a callback subscriber for one tenant
//! - Poll for updates with the last seen fingerprint
//!
//! Run with: cargo run --example tenant_worker

use serde::Serialize;
use settings_monitor::prelude::*;
use settings_monitor::sources::MemorySource;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AzureSettings {
    connection_string: String,
    tenant_id: String,
}

fn azure(connection_string: &str, tenant_id: &str) -> AzureSettings {
    AzureSettings {
        connection_string: connection_string.to_string(),
        tenant_id: tenant_id.to_string(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let source = MemorySource::new("tenants");
    source.preload(SlotName::default(), azure("Endpoint=sb://default", "1"));
    source.preload("TenantName", azure("Endpoint=sb://tenant", "2"));

    let monitor = SettingsMonitor::builder()
        .with_redaction(RedactionPolicy::secrets())
        .build()?;
    monitor.attach(&source)?;

    let worker = monitor.subscribe_fn("TenantName", |change| {
        println!("[worker] reconnecting after: {}", change);
    })?;

    let last_seen = monitor.fingerprint("TenantName");

    // The provider re-fires on every save; only the second save is a change.
    source.set("TenantName", azure("Endpoint=sb://tenant", "2"));
    source.set("TenantName", azure("Endpoint=sb://tenant-moved", "2"));
    source.set(SlotName::default(), azure("Endpoint=sb://default", "1"));

    let poll = monitor.check_for_update("TenantName", last_seen.as_ref());
    println!("[poll] changed={} message={:?}", poll.changed, poll.message);

    thread::sleep(Duration::from_millis(100));
    drop(worker);
    monitor.shutdown();
    Ok(())
}
