//! Configuration sources that feed reloads into a monitor.

mod config_source;
mod env;
mod file;
mod memory;
mod section;

pub use config_source::{ConfigLayer, ConfigSource, ReloadCallback};
pub use env::EnvLayer;
pub use file::FileLayer;
pub use memory::MemorySource;
pub use section::SectionSource;
