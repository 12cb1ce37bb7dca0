//! File configuration layer.

use super::ConfigLayer;
use crate::error::{MonitorError, Result};
use config::{File, Map, Source, Value};
use std::path::{Path, PathBuf};

/// A YAML, TOML or JSON settings file, format chosen by extension.
///
/// # Examples
///
/// ```rust,no_run
/// use settings_monitor::sources::FileLayer;
///
/// let production = FileLayer::new("appsettings.production.yaml").with_priority(110);
/// ```
pub struct FileLayer {
    path: PathBuf,
    priority: i32,
}

impl FileLayer {
    /// Layer for `path` at the default file priority of 100.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            priority: 100,
        }
    }

    /// Set the priority for this layer.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_format(&self) -> Result<()> {
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml" | "toml" | "json") => Ok(()),
            other => Err(MonitorError::LoadError(format!(
                "{}: expected a .yaml, .yml, .toml or .json file, found {:?}",
                self.path.display(),
                other.unwrap_or("no extension")
            ))),
        }
    }
}

impl ConfigLayer for FileLayer {
    fn load(&self) -> Result<Map<String, Value>> {
        self.check_format()?;
        File::from(self.path.as_path())
            .required(true)
            .collect()
            .map_err(|e| MonitorError::LoadError(format!("{}: {e}", self.path.display())))
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
