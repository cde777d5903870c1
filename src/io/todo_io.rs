use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::io::config_io::CONFIG_FILE;

/// Name looked for when discovering a project without a config file
pub const DEFAULT_TODO_FILE: &str = "todo.md";

/// Content of a freshly initialized todo file
pub const DEFAULT_TODO_CONTENT: &str = "\
# TODO

## Tasks
- [ ] Sample task
- [x] Completed task

## Ideas
- [ ] New feature idea

## Bugs
- [ ] Fix this bug
";

/// Error type for todo file I/O
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ConfigParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{0} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Walk up from `start` looking for a directory holding `todomd.toml` or
/// `todo.md`. Falls back to `start` itself, where a new file would go.
pub fn discover_root(start: &Path) -> PathBuf {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).is_file() || current.join(DEFAULT_TODO_FILE).is_file() {
            return current;
        }
        if !current.pop() {
            return start.to_path_buf();
        }
    }
}

/// Read the todo file. A missing file is `Ok(None)`, not an error.
pub fn read_todo(path: &Path) -> Result<Option<String>, TodoError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(TodoError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Replace the todo file's content atomically.
pub fn write_todo(path: &Path, content: &str) -> Result<(), TodoError> {
    atomic_write(path, content.as_bytes()).map_err(|e| TodoError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create the todo file with the starter content.
pub fn init_todo(path: &Path, force: bool) -> Result<(), TodoError> {
    if path.exists() && !force {
        return Err(TodoError::AlreadyExists(path.to_path_buf()));
    }
    write_todo(path, DEFAULT_TODO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_tasks;
    use tempfile::TempDir;

    #[test]
    fn test_read_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(read_todo(&tmp.path().join("todo.md")).unwrap().is_none());
    }

    #[test]
    fn test_read_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            read_todo(tmp.path()),
            Err(TodoError::ReadError { .. })
        ));
    }

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("todo.md");
        write_todo(&path, "- [ ] A\n").unwrap();
        write_todo(&path, "- [x] A\n").unwrap();
        assert_eq!(read_todo(&path).unwrap().as_deref(), Some("- [x] A\n"));
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope").join("todo.md");
        assert!(matches!(
            write_todo(&path, "x"),
            Err(TodoError::WriteError { .. })
        ));
    }

    #[test]
    fn test_discover_root_walks_up() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("todo.md"), "").unwrap();
        let sub = tmp.path().join("a/b");
        fs::create_dir_all(&sub).unwrap();
        assert_eq!(discover_root(&sub), tmp.path());
    }

    #[test]
    fn test_discover_root_finds_config() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("a");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join(CONFIG_FILE), "").unwrap();
        assert_eq!(discover_root(&sub), sub);
    }

    #[test]
    fn test_init_todo() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("todo.md");
        init_todo(&path, false).unwrap();
        assert_eq!(parse_tasks(&fs::read_to_string(&path).unwrap()).len(), 4);
        assert!(matches!(
            init_todo(&path, false),
            Err(TodoError::AlreadyExists(_))
        ));
        fs::write(&path, "scratch").unwrap();
        init_todo(&path, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_TODO_CONTENT);
    }
}
