use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Section name used for tasks that sit under no header.
pub const DEFAULT_CATEGORY: &str = "Tasks";

/// Number of UTF-16 code units of the text that go into the id slug.
const SLUG_UNITS: usize = 20;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*[\r\n]+\s*").unwrap());

/// A single checkbox line of the todo file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Content-derived id, see [`task_id`]
    pub id: String,
    /// Task text, trimmed
    pub text: String,
    /// `[x]` / `[X]` vs `[ ]`
    pub completed: bool,
    /// Zero-based line in the content this task was last parsed from or
    /// written to. `None` until the task has been written to the file.
    pub line: Option<usize>,
    /// Text of the nearest header above the task
    pub category: Option<String>,
}

impl Task {
    /// Create a task that has not been written to the file yet.
    pub fn new(text: &str, category: Option<String>) -> Self {
        let text = single_line(text);
        Task {
            id: task_id(&text),
            text,
            completed: false,
            line: None,
            category,
        }
    }

    /// The category the task is filed under, falling back to `Tasks`.
    pub fn effective_category(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }

    /// Whether the user-visible fields match (line numbers are ignored).
    pub fn same_content(&self, other: &Task) -> bool {
        self.id == other.id
            && self.text == other.text
            && self.completed == other.completed
            && self.category == other.category
    }
}

/// Trim `text` and fold any line breaks into a single space, so it fits on
/// one task line or header.
pub fn single_line(text: &str) -> String {
    LINE_BREAKS.replace_all(text.trim(), " ").into_owned()
}

/// Derive a stable id from task text: `task-<hash>-<slug>`.
///
/// The hash is the classic 31-multiplier rolling hash over UTF-16 code units,
/// wrapped to i32, absolute value in base 36. The slug is the first 20 code
/// units with whitespace runs collapsed to `-`, lowercased. Ids written by
/// earlier versions of the tool must keep resolving, so this must not change.
pub fn task_id(text: &str) -> String {
    let text = text.trim();
    let prefix: Vec<u16> = text.encode_utf16().take(SLUG_UNITS).collect();
    let prefix = String::from_utf16_lossy(&prefix);
    let slug = WHITESPACE_RUN.replace_all(&prefix, "-").to_lowercase();
    format!("task-{}-{}", to_base36(rolling_hash(text)), slug)
}

fn rolling_hash(text: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in text.encode_utf16() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(unit as i32);
    }
    hash.unsigned_abs()
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

/// Completion counts for a task list
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    /// Percentage in `0.0..=100.0`; `0.0` for an empty list
    pub completion_rate: f64,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.completed).count();
        let completion_rate = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        TaskStats {
            total,
            completed,
            remaining: total - completed,
            completion_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_matches_known_values() {
        assert_eq!(task_id("a"), "task-2p-a");
        assert_eq!(task_id("Buy milk"), "task-g66tt7-buy-milk");
        assert_eq!(task_id("Task 1"), "task-tpw3nu-task-1");
        assert_eq!(task_id("Review PR"), "task-tqhxzq-review-pr");
    }

    #[test]
    fn test_task_id_slug_is_truncated() {
        assert_eq!(
            task_id("Write the quarterly report for finance"),
            "task-eil9pq-write-the-quarterly-"
        );
    }

    #[test]
    fn test_task_id_ignores_surrounding_whitespace() {
        assert_eq!(task_id("  Buy milk \t"), task_id("Buy milk"));
    }

    #[test]
    fn test_task_id_is_case_sensitive_in_hash() {
        assert_ne!(task_id("Buy milk"), task_id("buy milk"));
    }

    #[test]
    fn test_new_task_is_unsaved() {
        let task = Task::new("  Buy milk ", Some("Errands".into()));
        assert_eq!(task.text, "Buy milk");
        assert_eq!(task.id, "task-g66tt7-buy-milk");
        assert_eq!(task.line, None);
        assert!(!task.completed);
        assert_eq!(task.effective_category(), "Errands");
    }

    #[test]
    fn test_new_task_folds_line_breaks() {
        let task = Task::new("first\nsecond \r\n\n third\n", None);
        assert_eq!(task.text, "first second third");
        assert_eq!(task.id, task_id("first second third"));
    }

    #[test]
    fn test_effective_category_fallback() {
        let task = Task::new("x", None);
        assert_eq!(task.effective_category(), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_stats_empty() {
        assert_eq!(
            TaskStats::from_tasks(&[]),
            TaskStats {
                total: 0,
                completed: 0,
                remaining: 0,
                completion_rate: 0.0
            }
        );
    }

    #[test]
    fn test_stats_counts() {
        let mut done = Task::new("a", None);
        done.completed = true;
        let stats = TaskStats::from_tasks(&[done, Task::new("b", None), Task::new("c", None), Task::new("d", None)]);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.remaining, 3);
        assert_eq!(stats.completion_rate, 25.0);
    }
}
