use serde::Serialize;

use crate::model::task::{Task, TaskStats};
use crate::sync::observer::{ChangeOrigin, NoticeLevel, SyncEvent};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskListJson {
    pub category: String,
    pub tasks: Vec<Task>,
}

#[derive(Serialize)]
pub struct CategoryJson {
    pub name: String,
    pub total: usize,
    pub completed: usize,
}

#[derive(Serialize)]
pub struct StatsJson {
    pub file: String,
    #[serde(flatten)]
    pub stats: TaskStats,
}

#[derive(Serialize)]
pub struct ReloadJson {
    pub file: String,
    pub tasks: usize,
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

fn check_char(completed: bool) -> char {
    if completed { 'x' } else { ' ' }
}

/// `  [x] Ship it  task-1a2b3c-ship-it`
pub fn format_task_line(task: &Task) -> String {
    format!("  [{}] {}  {}", check_char(task.completed), task.text, task.id)
}

pub fn format_category_header(name: &str, tasks: &[Task]) -> String {
    let done = tasks.iter().filter(|t| t.completed).count();
    format!("{} ({}/{})", name, done, tasks.len())
}

pub fn format_stats(stats: &TaskStats) -> Vec<String> {
    vec![
        format!("total      {}", stats.total),
        format!("completed  {}", stats.completed),
        format!("remaining  {}", stats.remaining),
        format!("progress   {:.0}%", stats.completion_rate),
    ]
}

/// One line per event, for `watch`.
pub fn format_event(event: &SyncEvent) -> String {
    match event {
        SyncEvent::TasksChanged { tasks, origin } => {
            let source = match origin {
                ChangeOrigin::Mutation => "edit",
                ChangeOrigin::File => "file",
            };
            let done = tasks.iter().filter(|t| t.completed).count();
            format!("[{}] {} tasks, {} done", source, tasks.len(), done)
        }
        SyncEvent::Notice { level, message } => match level {
            NoticeLevel::Info => format!("[info] {}", message),
            NoticeLevel::Error => format!("[error] {}", message),
        },
    }
}
