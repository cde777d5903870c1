use indexmap::IndexMap;

use crate::model::task::{Task, TaskStats, single_line, task_id};

/// Label for tasks without a header when grouping for display
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

/// Error type for task operations
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("'{query}' matches more than one task: {}", .candidates.join(", "))]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },
    #[error("task text cannot be empty")]
    EmptyText,
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Append a new, unsaved task. A blank category means uncategorized. Line
/// breaks in the text or category are folded into spaces.
pub fn add_task(
    tasks: &mut Vec<Task>,
    text: &str,
    category: Option<&str>,
) -> Result<Task, TaskError> {
    if text.trim().is_empty() {
        return Err(TaskError::EmptyText);
    }
    let category = category.map(single_line).filter(|c| !c.is_empty());
    let task = Task::new(text, category);
    tasks.push(task.clone());
    Ok(task)
}

/// Flip the completion state of the first task with `id`.
pub fn toggle_task<'a>(tasks: &'a mut [Task], id: &str) -> Result<&'a Task, TaskError> {
    let task = find_task_mut(tasks, id)?;
    task.completed = !task.completed;
    Ok(task)
}

/// Replace a task's text. The id is left alone so the next save can still
/// find the line it came from; it is recomputed once the change is on disk.
pub fn update_task<'a>(
    tasks: &'a mut [Task],
    id: &str,
    text: &str,
) -> Result<&'a Task, TaskError> {
    let text = single_line(text);
    if text.is_empty() {
        return Err(TaskError::EmptyText);
    }
    let task = find_task_mut(tasks, id)?;
    task.text = text;
    Ok(task)
}

/// Remove the first task with `id` and hand it back.
pub fn delete_task(tasks: &mut Vec<Task>, id: &str) -> Result<Task, TaskError> {
    let idx = tasks
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
    Ok(tasks.remove(idx))
}

/// Recompute every id from its text, for tasks whose text changed.
pub fn rekey(tasks: &mut [Task]) {
    for task in tasks.iter_mut() {
        task.id = task_id(&task.text);
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Resolve user input to a task id: an exact id wins, otherwise a prefix
/// that identifies exactly one distinct id.
pub fn resolve_id(tasks: &[Task], query: &str) -> Result<String, TaskError> {
    if tasks.iter().any(|t| t.id == query) {
        return Ok(query.to_string());
    }
    let mut candidates: Vec<String> = Vec::new();
    for task in tasks.iter().filter(|t| t.id.starts_with(query)) {
        if !candidates.contains(&task.id) {
            candidates.push(task.id.clone());
        }
    }
    match candidates.len() {
        0 => Err(TaskError::NotFound(query.to_string())),
        1 => Ok(candidates.remove(0)),
        _ => Err(TaskError::Ambiguous {
            query: query.to_string(),
            candidates,
        }),
    }
}

pub fn find_task<'a>(tasks: &'a [Task], id: &str) -> Option<&'a Task> {
    tasks.iter().find(|t| t.id == id)
}

fn find_task_mut<'a>(tasks: &'a mut [Task], id: &str) -> Result<&'a mut Task, TaskError> {
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| TaskError::NotFound(id.to_string()))
}

pub fn stats(tasks: &[Task]) -> TaskStats {
    TaskStats::from_tasks(tasks)
}

/// Group tasks by category for display, in first-seen order.
pub fn tasks_by_category(tasks: &[Task]) -> IndexMap<String, Vec<Task>> {
    let mut groups: IndexMap<String, Vec<Task>> = IndexMap::new();
    for task in tasks {
        let label = task.category.as_deref().unwrap_or(UNCATEGORIZED_LABEL);
        groups.entry(label.to_string()).or_default().push(task.clone());
    }
    groups
}

/// Distinct category names in first-seen order (uncategorized excluded).
pub fn categories(tasks: &[Task]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for category in tasks.iter().filter_map(|t| t.category.as_ref()) {
        if !names.contains(category) {
            names.push(category.clone());
        }
    }
    names
}
