use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration from todomd.toml. Every field has a default, so an absent
/// or empty file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub file: FileConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Todo file name, relative to the project root
    #[serde(default = "default_file_name")]
    pub name: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            name: default_file_name(),
        }
    }
}

/// Timing for the file/editor reconciliation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Quiet period before reacting to file-change notifications
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// How long a finished save keeps reloads suppressed
    #[serde(default = "default_save_hold_ms")]
    pub save_hold_ms: u64,
}

impl SyncConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn save_hold(&self) -> Duration {
        Duration::from_millis(self.save_hold_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            settle_ms: default_settle_ms(),
            save_hold_ms: default_save_hold_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// error, warn, info, debug or trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

fn default_file_name() -> String {
    "todo.md".to_string()
}

fn default_settle_ms() -> u64 {
    100
}

fn default_save_hold_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "warn".to_string()
}
