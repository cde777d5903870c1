use std::sync::LazyLock;

use regex::Regex;

use crate::model::task::{Task, task_id};
use crate::parse::span::TaskLine;

static HEADER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s*(.+)$").unwrap());
static TASK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)-\s*\[([ xX])\]\s*(.+)$").unwrap());

/// Parse markdown content into the tasks it contains, in file order.
///
/// Headers set the category for the lines that follow (the last header wins,
/// regardless of level). Every other non-task line is ignored.
pub fn parse_tasks(content: &str) -> Vec<Task> {
    let mut tasks = Vec::new();
    let mut category: Option<String> = None;

    for (idx, line) in split_lines(content).enumerate() {
        if let Some(header) = parse_header(line) {
            category = (!header.is_empty()).then(|| header.to_string());
            continue;
        }
        if let Some(task_line) = parse_task_line(line) {
            let text = task_line.text(line).trim();
            if text.is_empty() {
                continue;
            }
            tasks.push(Task {
                id: task_id(text),
                text: text.to_string(),
                completed: task_line.completed,
                line: Some(idx),
                category: category.clone(),
            });
        }
    }

    tasks
}

/// Split on `\n`, dropping the `\r` of CRLF endings. Line indices line up
/// with the generator's line buffer.
pub fn split_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

/// Trimmed header text if `line` is a `#`..`######` header.
pub fn parse_header(line: &str) -> Option<&str> {
    HEADER_LINE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Locate the parts of a `- [ ] text` line.
pub fn parse_task_line(line: &str) -> Option<TaskLine> {
    let caps = TASK_LINE.captures(line)?;
    let indent = caps.get(1)?;
    let checkbox = caps.get(2)?;
    let text = caps.get(3)?;
    Some(TaskLine {
        indent: indent.range(),
        checkbox: checkbox.range(),
        text: text.range(),
        completed: checkbox.as_str().eq_ignore_ascii_case("x"),
    })
}
