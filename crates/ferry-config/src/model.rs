//! Configuration data carriers.
//!
//! # Design
//! - Pure data; IO and validation live in `loader.rs` and `validate.rs`.

use serde::{Deserialize, Serialize};
use url::Url;

/// Complete configuration for one worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// URL scheme this worker registers under (e.g. `media`).
    pub scheme: String,
    /// Mount table mapping virtual path prefixes onto underlying URLs.
    pub mounts: Vec<MountPoint>,
    /// Logging settings applied at process start.
    #[serde(default)]
    pub logging: LogSettings,
}

/// One mount-table row: a virtual prefix and its underlying location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountPoint {
    /// Virtual path prefix under the worker scheme (e.g. `/cdrom`).
    pub prefix: String,
    /// Underlying URL the prefix maps onto (e.g. `file:///mnt/cdrom/`).
    pub target: Url,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogSettings {
    /// Log level string handed to the subscriber filter.
    #[serde(default = "default_level")]
    pub level: String,
    /// Optional output format name (`json` or `pretty`).
    pub format: Option<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
