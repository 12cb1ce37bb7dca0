//! Change notification delivery and file watching.
//!
//! The [`NotificationBus`] fans change descriptions out to subscribers. With
//! the `file-watch` feature, [`ConfigWatcher`] turns file system events into
//! debounced reload signals.

pub mod bus;

#[cfg(feature = "file-watch")]
pub mod watcher;

pub use bus::{NotificationBus, Subscription, SubscriptionHandle};

#[cfg(feature = "file-watch")]
pub use watcher::ConfigWatcher;
