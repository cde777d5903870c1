use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Events sent from the file watcher to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    Created,
    Changed,
    Removed,
}

/// Watches the directory holding the todo file and reports events that
/// concern the todo file only.
pub struct TodoWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<FileEvent>,
}

impl TodoWatcher {
    /// Start watching `todo_path`. The file itself does not have to exist;
    /// its directory does.
    pub fn start(todo_path: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let file_name: OsString = todo_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        let dir = match todo_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(_) => return,
                };

                let kind = match event.kind {
                    EventKind::Create(_) => FileEvent::Created,
                    EventKind::Modify(_) => FileEvent::Changed,
                    EventKind::Remove(_) => FileEvent::Removed,
                    _ => return,
                };

                // Atomic saves go through a temp file in the same directory
                let ours = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()));
                if ours {
                    let _ = tx.send(kind);
                }
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        Ok(TodoWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking poll for pending file events.
    /// Returns all queued events (may be empty).
    pub fn poll(&self) -> Vec<FileEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }
}
