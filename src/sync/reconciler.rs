use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use indexmap::IndexMap;

use crate::io::todo_io;
use crate::io::watcher::FileEvent;
use crate::model::config::SyncConfig;
use crate::model::task::{Task, TaskStats, task_id};
use crate::ops::task_ops::{self, TaskError};
use crate::parse::{assign_lines, generate_content, parse_tasks, remove_tasks};
use crate::sync::debounce::Debouncer;
use crate::sync::observer::{ChangeOrigin, NoticeLevel, Subscribers, Subscription, SyncEvent};
use crate::sync::state::{PhaseEvent, SyncPhase, transition};

/// Result of the most recent attempt to write the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing has been saved yet
    None,
    Written,
    /// Generated content matched the file, nothing was written
    Unchanged,
    /// Another save or reload was in progress; retried on the next tick
    Deferred,
    Failed(String),
}

/// Owns the task list for one todo file and keeps it in step with the file.
///
/// Mutations update the list, notify subscribers right away, then write the
/// file through the generator so that unrelated lines are left untouched.
/// Changes made to the file by other programs arrive through
/// [`handle_file_event`](Self::handle_file_event) and are applied after a
/// quiet period, unless they are the echo of our own save.
pub struct Reconciler {
    path: PathBuf,
    config: SyncConfig,
    tasks: Vec<Task>,
    last_known_content: Option<String>,
    phase: SyncPhase,
    debouncer: Debouncer,
    subscribers: Subscribers,
    pending_save: bool,
    /// Deleted tasks whose lines still have to come out of the file
    pending_removals: Vec<Task>,
    last_save: SaveOutcome,
    last_synced: Option<DateTime<Local>>,
    /// Why the initial load failed, if it did
    load_error: Option<String>,
    /// Delivered to the first subscriber
    startup_notice: Option<SyncEvent>,
}

impl Reconciler {
    /// Load `path`. A missing file is an empty list; the file is created on
    /// the first save. A file that can't be read also starts empty: the
    /// failure is logged, kept in [`load_error`](Self::load_error) and sent
    /// as an Error notice to the first subscriber.
    pub fn open(path: &Path, config: SyncConfig) -> Self {
        let (content, load_error) = match todo_io::read_todo(path) {
            Ok(content) => (content, None),
            Err(e) => {
                tracing::warn!(error = %e, "load failed, starting with no tasks");
                (None, Some(e.to_string()))
            }
        };
        let tasks = content.as_deref().map(parse_tasks).unwrap_or_default();
        tracing::debug!(path = %path.display(), tasks = tasks.len(), "loaded todo file");
        let startup_notice = load_error.as_ref().map(|e| SyncEvent::Notice {
            level: NoticeLevel::Error,
            message: format!("Failed to load: {}", e),
        });
        Reconciler {
            path: path.to_path_buf(),
            config,
            tasks,
            last_known_content: content,
            phase: SyncPhase::Idle,
            debouncer: Debouncer::new(config.settle()),
            subscribers: Subscribers::new(),
            pending_save: false,
            pending_removals: Vec::new(),
            last_save: SaveOutcome::None,
            last_synced: load_error.is_none().then(Local::now),
            load_error,
            startup_notice,
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn stats(&self) -> TaskStats {
        task_ops::stats(&self.tasks)
    }

    pub fn tasks_by_category(&self) -> IndexMap<String, Vec<Task>> {
        task_ops::tasks_by_category(&self.tasks)
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn last_save(&self) -> &SaveOutcome {
        &self.last_save
    }

    /// When the list last matched the file (load, reload or save).
    pub fn last_synced(&self) -> Option<DateTime<Local>> {
        self.last_synced
    }

    pub fn has_pending_save(&self) -> bool {
        self.pending_save
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn subscribe(&mut self) -> Subscription {
        let sub = self.subscribers.subscribe();
        if let Some(event) = self.startup_notice.take() {
            self.publish(event);
        }
        sub
    }

    /// The earliest instant at which [`tick_at`](Self::tick_at) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.phase.release_at(), self.debouncer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub fn add_task(&mut self, text: &str, category: Option<&str>) -> Result<Task, TaskError> {
        let task = task_ops::add_task(&mut self.tasks, text, category)?;
        tracing::info!(id = %task.id, "added task");
        self.mutated();
        Ok(task)
    }

    pub fn toggle_task(&mut self, id: &str) -> Result<Task, TaskError> {
        let task = task_ops::toggle_task(&mut self.tasks, id)?.clone();
        tracing::info!(id = %task.id, completed = task.completed, "toggled task");
        self.mutated();
        Ok(task)
    }

    /// Change a task's text. The returned task carries the id its new text
    /// will have once the change is saved.
    pub fn update_task(&mut self, id: &str, text: &str) -> Result<Task, TaskError> {
        let mut task = task_ops::update_task(&mut self.tasks, id, text)?.clone();
        tracing::info!(id = %task.id, "updated task");
        self.mutated();
        task.id = task_id(&task.text);
        Ok(task)
    }

    pub fn delete_task(&mut self, id: &str) -> Result<Task, TaskError> {
        let task = task_ops::delete_task(&mut self.tasks, id)?;
        tracing::info!(id = %task.id, "deleted task");
        if task.line.is_some() {
            self.pending_removals.push(task.clone());
        }
        self.mutated();
        Ok(task)
    }

    fn mutated(&mut self) {
        self.publish(SyncEvent::TasksChanged {
            tasks: self.tasks.clone(),
            origin: ChangeOrigin::Mutation,
        });
        self.persist_at(Instant::now());
    }

    // -----------------------------------------------------------------------
    // Saving
    // -----------------------------------------------------------------------

    fn persist_at(&mut self, now: Instant) {
        self.release_phase(now);
        self.phase = match transition(self.phase, PhaseEvent::BeginSave) {
            Ok(phase) => phase,
            Err(_) => {
                tracing::debug!(phase = self.phase.label(), "save deferred");
                self.pending_save = true;
                self.last_save = SaveOutcome::Deferred;
                return;
            }
        };
        self.pending_save = false;

        let outcome = self.write_file();
        let release_at = match &outcome {
            SaveOutcome::Written | SaveOutcome::Unchanged => now + self.config.save_hold(),
            _ => now,
        };
        self.finish_phase(release_at);

        if let SaveOutcome::Failed(message) = &outcome {
            tracing::warn!(path = %self.path.display(), error = %message, "save failed");
            self.pending_save = true;
            self.notice(NoticeLevel::Error, format!("Failed to save: {}", message));
        }
        self.last_save = outcome;
    }

    /// Merge the list into the current file. If the file changed since we
    /// last saw it, the merged result holds lines we haven't loaded yet, so
    /// the list is re-read from what was written.
    fn write_file(&mut self) -> SaveOutcome {
        let on_disk = match todo_io::read_todo(&self.path) {
            Ok(content) => content,
            Err(e) => return SaveOutcome::Failed(e.to_string()),
        };
        let edited_externally = on_disk != self.last_known_content;
        let base = on_disk
            .as_deref()
            .map(|content| remove_tasks(content, &self.pending_removals));
        let content = generate_content(&self.tasks, base.as_deref());

        let outcome = if on_disk.as_deref() == Some(content.as_str()) {
            SaveOutcome::Unchanged
        } else {
            if let Err(e) = todo_io::write_todo(&self.path, &content) {
                return SaveOutcome::Failed(e.to_string());
            }
            tracing::debug!(path = %self.path.display(), bytes = content.len(), "saved");
            SaveOutcome::Written
        };

        self.pending_removals.clear();
        if edited_externally {
            tracing::debug!("file changed under the save, adopting merged content");
            self.replace_tasks(parse_tasks(&content));
        } else {
            task_ops::rekey(&mut self.tasks);
            assign_lines(&mut self.tasks, &content);
        }
        self.last_known_content = Some(content);
        self.last_synced = Some(Local::now());
        outcome
    }

    // -----------------------------------------------------------------------
    // Reloading
    // -----------------------------------------------------------------------

    /// Note a watcher event for the todo file. The reload happens on a later
    /// tick, once events have stopped arriving for `settle_ms`.
    pub fn handle_file_event(&mut self, event: FileEvent) {
        self.handle_file_event_at(event, Instant::now());
    }

    pub fn handle_file_event_at(&mut self, event: FileEvent, now: Instant) {
        tracing::trace!(?event, "file event");
        self.debouncer.trigger(now);
    }

    /// Re-read the file now, even if it looks unchanged.
    pub fn force_reload(&mut self) {
        let now = Instant::now();
        self.debouncer.cancel();
        self.release_phase(now);
        if self.pending_save && self.phase.is_idle() {
            self.persist_at(now);
            self.release_phase(Instant::now());
        }
        if !self.phase.is_idle() {
            self.wait_for_release();
        }
        self.reload_at(Instant::now(), true);
    }

    fn reload_at(&mut self, now: Instant, force: bool) {
        self.phase = match transition(self.phase, PhaseEvent::BeginReload) {
            Ok(phase) => phase,
            Err(_) => {
                self.debouncer.trigger(now);
                return;
            }
        };

        match todo_io::read_todo(&self.path) {
            Ok(content) => {
                if force || content != self.last_known_content {
                    let tasks = content.as_deref().map(parse_tasks).unwrap_or_default();
                    if content.is_none() {
                        tracing::info!(path = %self.path.display(), "todo file is gone");
                    }
                    self.last_known_content = content;
                    self.replace_tasks(tasks);
                }
                self.last_synced = Some(Local::now());
            }
            Err(e) => {
                tracing::warn!(error = %e, "reload failed");
                self.last_known_content = None;
                self.replace_tasks(Vec::new());
                self.notice(NoticeLevel::Error, format!("Failed to reload: {}", e));
            }
        }
        self.finish_phase(now);
    }

    /// Adopt a freshly parsed list, notifying only when something a reader
    /// can see has changed.
    fn replace_tasks(&mut self, tasks: Vec<Task>) {
        let same = tasks.len() == self.tasks.len()
            && tasks.iter().zip(&self.tasks).all(|(a, b)| a.same_content(b));
        self.tasks = tasks;
        self.pending_removals.clear();
        if !same {
            tracing::info!(tasks = self.tasks.len(), "reloaded from file");
            self.publish(SyncEvent::TasksChanged {
                tasks: self.tasks.clone(),
                origin: ChangeOrigin::File,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Release an expired phase hold, flush a deferred save, then run a due
    /// reload. A reload that comes due while busy is pushed back.
    pub fn tick_at(&mut self, now: Instant) {
        self.release_phase(now);
        if self.pending_save && self.phase.is_idle() {
            self.persist_at(now);
        }
        if self.debouncer.take_due(now) {
            if self.phase.is_idle() {
                self.reload_at(now, false);
            } else {
                self.debouncer.trigger(now);
            }
        }
    }

    /// Wait out the current hold and flush a deferred save. One-shot callers
    /// use this before exiting so no change is left unwritten.
    pub fn settle(&mut self) {
        if !self.pending_save {
            return;
        }
        self.wait_for_release();
        self.persist_at(Instant::now());
    }

    fn wait_for_release(&mut self) {
        if let Some(release_at) = self.phase.release_at() {
            let wait = release_at.saturating_duration_since(Instant::now());
            if wait > Duration::ZERO {
                std::thread::sleep(wait);
            }
            self.release_phase(release_at.max(Instant::now()));
        }
    }

    fn release_phase(&mut self, now: Instant) {
        if let Ok(phase) = transition(self.phase, PhaseEvent::Tick(now)) {
            self.phase = phase;
        }
    }

    fn finish_phase(&mut self, release_at: Instant) {
        match transition(self.phase, PhaseEvent::Finished { release_at }) {
            Ok(phase) => self.phase = phase,
            Err(e) => {
                tracing::error!(error = %e, "phase machine out of step");
                self.phase = SyncPhase::Idle;
            }
        }
    }

    fn publish(&mut self, event: SyncEvent) {
        self.subscribers.publish(&event);
    }

    fn notice(&mut self, level: NoticeLevel, message: String) {
        self.publish(SyncEvent::Notice { level, message });
    }
}
