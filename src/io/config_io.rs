use std::fs;
use std::io;
use std::path::Path;

use crate::io::todo_io::{TodoError, atomic_write};
use crate::model::config::Config;

/// Config file name, looked up in the project root
pub const CONFIG_FILE: &str = "todomd.toml";

const CONFIG_TEMPLATE: &str = r##"# todomd configuration. Every setting is optional.

[file]
# Todo file, relative to this directory
name = "todo.md"

[sync]
# Quiet period (ms) before reacting to changes made by other programs
settle_ms = 100
# How long (ms) after our own save file events are held back
save_hold_ms = 500

[log]
# error, warn, info, debug or trace
level = "warn"
"##;

/// Read todomd.toml from `root`. A missing file yields the defaults.
pub fn read_config(root: &Path) -> Result<Config, TodoError> {
    let config_path = root.join(CONFIG_FILE);
    let text = match fs::read_to_string(&config_path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => {
            return Err(TodoError::ReadError {
                path: config_path,
                source: e,
            });
        }
    };
    toml::from_str(&text).map_err(|e| TodoError::ConfigParseError {
        path: config_path,
        source: e,
    })
}

/// Write the commented starter config unless one already exists.
/// Returns whether a file was written.
pub fn write_default_config(root: &Path) -> Result<bool, TodoError> {
    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        return Ok(false);
    }
    atomic_write(&config_path, CONFIG_TEMPLATE.as_bytes()).map_err(|e| TodoError::WriteError {
        path: config_path,
        source: e,
    })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_config(tmp.path()).unwrap();
        assert_eq!(config.file.name, "todo.md");
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let tmp = TempDir::new().unwrap();
        assert!(write_default_config(tmp.path()).unwrap());
        assert!(!write_default_config(tmp.path()).unwrap());
        let config = read_config(tmp.path()).unwrap();
        assert_eq!(config.sync, Config::default().sync);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_invalid_config_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[sync]\nsettle_ms = \"soon\"\n").unwrap();
        assert!(matches!(
            read_config(tmp.path()),
            Err(TodoError::ConfigParseError { .. })
        ));
    }
}
