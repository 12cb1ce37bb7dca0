//! File watching for automatic configuration reloads.

use crate::error::{MonitorError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};

/// Debounced watcher for settings files.
///
/// Writes are grouped into bursts: a burst ends once the watched files have
/// been quiet for the debounce duration, and each burst yields exactly one
/// reload signal. [`SectionSource::watch`](crate::sources::SectionSource::watch)
/// drives reloads from it.
///
/// # Examples
///
/// ```rust,no_run
/// use settings_monitor::notify::ConfigWatcher;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (watcher, mut rx) = ConfigWatcher::new(Duration::from_millis(500))?;
/// watcher.watch("appsettings.yaml").await?;
///
/// while let Some(()) = rx.recv().await {
///     println!("settings file changed");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConfigWatcher {
    watcher: Arc<tokio::sync::Mutex<RecommendedWatcher>>,
    debounce_duration: Duration,
    watched_paths: Arc<tokio::sync::Mutex<Vec<PathBuf>>>,
}

impl ConfigWatcher {
    /// Create a watcher and the receiver its reload signals arrive on.
    ///
    /// Must be called within a Tokio runtime. The signal for a burst is sent
    /// `debounce_duration` after its last write.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying file watcher cannot be created.
    pub fn new(debounce_duration: Duration) -> Result<(Self, mpsc::Receiver<()>)> {
        let (tx, rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                let _ = event_tx.send(());
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "file watcher error"),
        })
        .map_err(|e| MonitorError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        tokio::spawn(debounce(event_rx, tx, debounce_duration));

        Ok((
            Self {
                watcher: Arc::new(tokio::sync::Mutex::new(watcher)),
                debounce_duration,
                watched_paths: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            },
            rx,
        ))
    }

    /// Add a file to the watch set.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be watched (e.g., doesn't exist).
    pub async fn watch(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();

        let canonical_path = path
            .canonicalize()
            .map_err(|e| MonitorError::WatchError(format!("Failed to resolve path: {}", e)))?;

        let mut watcher = self.watcher.lock().await;
        watcher
            .watch(&canonical_path, RecursiveMode::NonRecursive)
            .map_err(|e| MonitorError::WatchError(format!("Failed to watch path: {}", e)))?;

        let mut paths = self.watched_paths.lock().await;
        if !paths.contains(&canonical_path) {
            tracing::debug!(path = %canonical_path.display(), "watching settings file");
            paths.push(canonical_path);
        }

        Ok(())
    }

    /// Remove a file from the watch set.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be unwatched.
    pub async fn unwatch(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let canonical_path = path.canonicalize().map_err(|e| {
            MonitorError::WatchError(format!("Failed to resolve path for unwatching: {}", e))
        })?;

        let mut watcher = self.watcher.lock().await;
        watcher
            .unwatch(&canonical_path)
            .map_err(|e| MonitorError::WatchError(format!("Failed to unwatch path: {}", e)))?;

        let mut paths = self.watched_paths.lock().await;
        paths.retain(|p| p != &canonical_path);

        Ok(())
    }

    /// Get the debounce duration for this watcher.
    pub fn debounce_duration(&self) -> Duration {
        self.debounce_duration
    }

    /// Get a list of currently watched paths.
    pub async fn watched_paths(&self) -> Vec<PathBuf> {
        self.watched_paths.lock().await.clone()
    }
}

/// Collapse raw file events into one signal per quiet period.
///
/// Ends when either side of the pipe is closed.
async fn debounce(
    mut events: mpsc::UnboundedReceiver<()>,
    signals: mpsc::Sender<()>,
    quiet: Duration,
) {
    while events.recv().await.is_some() {
        let mut deadline = Instant::now() + quiet;
        loop {
            match timeout_at(deadline, events.recv()).await {
                Ok(Some(())) => deadline = Instant::now() + quiet,
                Ok(None) | Err(_) => break,
            }
        }
        if signals.send(()).await.is_err() {
            return;
        }
    }
}
