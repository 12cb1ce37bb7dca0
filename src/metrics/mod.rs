//! Built-in metrics for settings monitoring.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Reload attempts, published changes and no-op reloads
//! - Reload duration
//! - Faults by kind
//! - Active subscribers
//! - Age of the most recent change
//!
//! # Examples
//!
//! ```rust,no_run
//! use settings_monitor::prelude::*;
//! use opentelemetry::global;
//!
//! let monitor = SettingsMonitor::<serde_json::Value>::builder()
//!     .with_metrics(global::meter("my-app"))
//!     .build()
//!     .expect("monitor");
//! ```

mod monitor_metrics;

pub use monitor_metrics::MonitorMetrics;
