use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::model::task::{DEFAULT_CATEGORY, Task};
use crate::parse::task_parser::{parse_task_line, parse_tasks};

/// A checkbox at the start of an already-trimmed line
static CHECKBOX_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-\s*\[[ xX]\]").unwrap());
static TASKS_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^#{1,6}\s*Tasks\s*$").unwrap());

const DEFAULT_TITLE: &str = "# Todo List";

/// Render `tasks` as markdown.
///
/// With original content, lines of tasks that already exist are updated in
/// place, everything else is kept byte-for-byte, and tasks that are not in
/// the file yet are inserted at the end of their category's task run (the
/// section is created when missing). Without original content, or when it is
/// blank and there is something to write, a fresh document is laid out.
pub fn generate_content(tasks: &[Task], original: Option<&str>) -> String {
    match original {
        Some(content) if !(content.trim().is_empty() && !tasks.is_empty()) => {
            merge_into(tasks, content)
        }
        _ => default_content(tasks),
    }
}

/// Fresh document: one `##` section per category in first-seen order, with
/// uncategorized tasks filed under `Tasks`.
pub fn default_content(tasks: &[Task]) -> String {
    let mut out = format!("{}\n\n", DEFAULT_TITLE);
    if tasks.is_empty() {
        out.push_str(&format!("## {}\n\n", DEFAULT_CATEGORY));
        return out;
    }

    let mut sections: IndexMap<&str, Vec<&Task>> = IndexMap::new();
    for task in tasks {
        sections.entry(task.effective_category()).or_default().push(task);
    }

    for (i, (category, section_tasks)) in sections.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("## {}\n\n", category));
        for task in section_tasks {
            out.push_str(&task_line(task));
            out.push('\n');
        }
    }
    out
}

/// Re-validate `line` for every task against `content`: a task keeps a line
/// only if the task parsed there has the same id. Tasks with no counterpart
/// get `None`.
pub fn assign_lines(tasks: &mut [Task], content: &str) {
    let existing = parse_tasks(content);
    let mut claimed = vec![false; existing.len()];
    for task in tasks.iter_mut() {
        task.line = claim_existing(task, &existing, &mut claimed).and_then(|i| existing[i].line);
    }
}

/// Drop the lines of `removed` tasks from `content`. Each removed task takes
/// out at most one line, chosen the same way updates pick their line.
pub fn remove_tasks(content: &str, removed: &[Task]) -> String {
    if removed.is_empty() {
        return content.to_string();
    }
    let existing = parse_tasks(content);
    let mut claimed = vec![false; existing.len()];
    let mut doomed: Vec<usize> = removed
        .iter()
        .filter_map(|task| claim_existing(task, &existing, &mut claimed))
        .filter_map(|i| existing[i].line)
        .collect();
    if doomed.is_empty() {
        return content.to_string();
    }
    doomed.sort_unstable();

    let mut buf = LineBuffer::new(content);
    for line_idx in doomed.into_iter().rev() {
        buf.remove(line_idx);
    }
    buf.into_content()
}

fn merge_into(tasks: &[Task], original: &str) -> String {
    let mut buf = LineBuffer::new(original);
    let existing = parse_tasks(original);
    let mut claimed = vec![false; existing.len()];

    // Phase 1: rewrite matched lines in place
    for task in tasks {
        if let Some(idx) = claim_existing(task, &existing, &mut claimed)
            && let Some(line_idx) = existing[idx].line
            && line_idx < buf.len()
        {
            buf.rewrite_task(line_idx, task);
        }
    }

    // Phase 2: only tasks with no counterpart by id or by text + category are new
    let new_tasks: Vec<&Task> = tasks
        .iter()
        .filter(|task| {
            let text = task.text.trim();
            !existing.iter().any(|et| {
                et.id == task.id
                    || (et.text.trim() == text
                        && et.effective_category() == task.effective_category())
            })
        })
        .collect();
    if new_tasks.is_empty() {
        return buf.into_content();
    }

    // Phase 3: insert, grouped by category in first-seen order
    let mut by_category: IndexMap<&str, Vec<&Task>> = IndexMap::new();
    let mut uncategorized: Vec<&Task> = Vec::new();
    for task in new_tasks {
        match task.category.as_deref() {
            Some(category) => by_category.entry(category).or_default().push(task),
            None => uncategorized.push(task),
        }
    }

    for (category, category_tasks) in &by_category {
        insert_into_section(&mut buf, category, category_tasks);
    }

    if !uncategorized.is_empty() {
        if !buf.lines.iter().any(|l| TASKS_HEADER.is_match(l.body.trim_end())) {
            buf.push("");
            buf.push(&format!("## {}", DEFAULT_CATEGORY));
            buf.push("");
        }
        insert_into_section(&mut buf, DEFAULT_CATEGORY, &uncategorized);
    }

    buf.into_content()
}

/// Pick the existing task an incoming task corresponds to: same id, not yet
/// claimed, preferring the one at the task's recorded line.
fn claim_existing(task: &Task, existing: &[Task], claimed: &mut [bool]) -> Option<usize> {
    let candidates = || {
        existing
            .iter()
            .enumerate()
            .filter(|(i, et)| !claimed[*i] && et.id == task.id)
    };
    let idx = candidates()
        .find(|(_, et)| task.line.is_some() && et.line == task.line)
        .or_else(|| candidates().next())
        .map(|(i, _)| i)?;
    claimed[idx] = true;
    Some(idx)
}

fn insert_into_section(buf: &mut LineBuffer, category: &str, tasks: &[&Task]) {
    let (mut index, found) = find_insertion_point(buf, category);
    if !found {
        buf.insert(index, "");
        buf.insert(index + 1, &format!("## {}", category));
        buf.insert(index + 2, "");
        index += 3;
    }
    for (offset, task) in tasks.iter().enumerate() {
        buf.insert(index + offset, &task_line(task));
    }
}

/// Where new tasks for `category` go, and whether its header exists.
///
/// Starts right after the first matching header, moves past every checkbox
/// line of the section, and stops at the next header or at a blank line once
/// a checkbox line has been passed.
fn find_insertion_point(buf: &LineBuffer, category: &str) -> (usize, bool) {
    let wanted = category.to_lowercase();

    for (i, line) in buf.lines.iter().enumerate() {
        let trimmed = line.body.trim();
        if !trimmed.starts_with('#') {
            continue;
        }
        let header_text = trimmed.trim_start_matches('#').trim();
        if header_text.to_lowercase() != wanted {
            continue;
        }

        let mut index = i + 1;
        for (j, next) in buf.lines.iter().enumerate().skip(i + 1) {
            let next = next.body.trim();
            if next.starts_with('#') {
                index = j;
                break;
            }
            if CHECKBOX_PREFIX.is_match(next) {
                index = j + 1;
            }
            if next.is_empty() && index > i + 1 {
                break;
            }
        }
        return (index, true);
    }

    (buf.len(), false)
}

fn task_line(task: &Task) -> String {
    format!("- [{}] {}", if task.completed { 'x' } else { ' ' }, task.text)
}

// ---------------------------------------------------------------------------
// Line buffer
// ---------------------------------------------------------------------------

struct Line {
    body: String,
    /// Use `\r\n` when a newline follows this line
    cr: bool,
}

/// The original content as editable lines, keeping each line's own ending.
struct LineBuffer {
    lines: Vec<Line>,
    crlf: bool,
}

impl LineBuffer {
    fn new(content: &str) -> Self {
        let crlf = content.contains("\r\n");
        let segments: Vec<&str> = content.split('\n').collect();
        let last = segments.len() - 1;
        let lines = segments
            .into_iter()
            .enumerate()
            .map(|(i, raw)| match raw.strip_suffix('\r') {
                Some(body) if i < last => Line {
                    body: body.to_string(),
                    cr: true,
                },
                // the final segment has no terminator, so a \r there is content
                _ => Line {
                    body: raw.to_string(),
                    cr: i == last && crlf,
                },
            })
            .collect();
        LineBuffer { lines, crlf }
    }

    fn len(&self) -> usize {
        self.lines.len()
    }

    fn insert(&mut self, index: usize, body: &str) {
        let line = Line {
            body: body.to_string(),
            cr: self.crlf,
        };
        self.lines.insert(index.min(self.lines.len()), line);
    }

    fn push(&mut self, body: &str) {
        self.insert(self.lines.len(), body);
    }

    fn remove(&mut self, index: usize) {
        if index < self.lines.len() {
            self.lines.remove(index);
        }
    }

    /// Bring the checkbox and text of a task line in line with `task`,
    /// leaving every other byte alone.
    fn rewrite_task(&mut self, index: usize, task: &Task) {
        let line = &mut self.lines[index];
        let Some(parsed) = parse_task_line(&line.body) else {
            return;
        };

        let mut body = String::with_capacity(line.body.len());
        body.push_str(&line.body[..parsed.checkbox.start]);
        if parsed.completed == task.completed {
            body.push_str(&line.body[parsed.checkbox.clone()]);
        } else {
            body.push(if task.completed { 'x' } else { ' ' });
        }
        body.push_str(&line.body[parsed.checkbox.end..parsed.text.start]);
        if parsed.text(&line.body).trim() == task.text.trim() {
            body.push_str(parsed.text(&line.body));
        } else {
            body.push_str(&task.text);
        }
        line.body = body;
    }

    fn into_content(self) -> String {
        let last = self.lines.len().saturating_sub(1);
        let mut out = String::new();
        for (i, line) in self.lines.into_iter().enumerate() {
            out.push_str(&line.body);
            if i < last {
                if line.cr {
                    out.push('\r');
                }
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn regenerate(content: &str) -> String {
        generate_content(&parse_tasks(content), Some(content))
    }

    #[test]
    fn test_round_trip_is_identity() {
        for content in [
            "",
            "\n",
            "# Tasks\n- [ ] Task 1\n- [x] Task 2\n",
            "# Work\n\nSome notes.\n\n  - [ ]   spaced   \n-[X]tight\n\n## Personal\n- [x] B",
            "- [ ] Same\n- [x] Same\n- [ ] Same",
            "# Work\r\n- [ ] A\r\n\r\nprose\r\n",
            "no tasks at all\n\n> quote\n",
        ] {
            assert_eq!(regenerate(content), content);
        }
    }

    #[test]
    fn test_toggle_rewrites_checkbox_only() {
        let content = "- [ ] Buy milk";
        let mut tasks = parse_tasks(content);
        tasks[0].completed = true;
        assert_eq!(generate_content(&tasks, Some(content)), "- [x] Buy milk");
    }

    #[test]
    fn test_toggle_preserves_indentation_and_spacing() {
        let content = "# Home\n    -  [x]   Water plants  \nafter";
        let mut tasks = parse_tasks(content);
        tasks[0].completed = false;
        assert_eq!(
            generate_content(&tasks, Some(content)),
            "# Home\n    -  [ ]   Water plants  \nafter"
        );
    }

    #[test]
    fn test_uppercase_x_kept_when_still_completed() {
        let content = "- [X] Done already";
        assert_eq!(regenerate(content), content);
    }

    #[test]
    fn test_rekeyed_text_is_a_new_task() {
        let content = "# Work\n  - [ ] Old text\n- [ ] Other";
        let mut tasks = parse_tasks(content);
        tasks[0].text = "New text".to_string();
        tasks[0].id = crate::model::task::task_id("New text");
        // nothing in the file carries the new id, so the line is inserted
        // rather than rewritten
        let out = generate_content(&tasks, Some(content));
        assert_eq!(out, "# Work\n  - [ ] Old text\n- [ ] Other\n- [ ] New text");
    }

    #[test]
    fn test_text_update_with_same_id_rewrites_in_place() {
        let content = "  - [ ] Buy milk   \n";
        let mut tasks = parse_tasks(content);
        tasks[0].text = "Buy milk and eggs".to_string();
        assert_eq!(
            generate_content(&tasks, Some(content)),
            "  - [ ] Buy milk and eggs\n"
        );
    }

    #[test]
    fn test_crlf_preserved_on_rewrite() {
        let content = "# Work\r\n- [ ] A\r\n- [ ] B\r\n";
        let mut tasks = parse_tasks(content);
        tasks[1].completed = true;
        assert_eq!(
            generate_content(&tasks, Some(content)),
            "# Work\r\n- [ ] A\r\n- [x] B\r\n"
        );
    }

    #[test]
    fn test_duplicate_lines_toggle_independently() {
        let content = "- [ ] Same\n- [ ] Same";
        let mut tasks = parse_tasks(content);
        tasks[1].completed = true;
        assert_eq!(generate_content(&tasks, Some(content)), "- [ ] Same\n- [x] Same");
    }

    #[test]
    fn test_new_category_section_is_appended() {
        let content = "# Tasks\n";
        let mut tasks = parse_tasks(content);
        tasks.push(Task::new("Write blog post", Some("Ideas".into())));
        let out = generate_content(&tasks, Some(content));
        assert_eq!(out, "# Tasks\n\n\n## Ideas\n\n- [ ] Write blog post");
        assert!(out.starts_with(content));
    }

    #[test]
    fn test_insert_after_existing_task_run() {
        let content = "# Work\n- [ ] A\n- [x] B\n\nNotes about work.\n\n# Home\n- [ ] C\n";
        let mut tasks = parse_tasks(content);
        tasks.push(Task::new("D", Some("Work".into())));
        assert_eq!(
            generate_content(&tasks, Some(content)),
            "# Work\n- [ ] A\n- [x] B\n- [ ] D\n\nNotes about work.\n\n# Home\n- [ ] C\n"
        );
    }

    #[test]
    fn test_insert_before_next_header_when_section_has_no_tasks() {
        let content = "## Ideas\nSomething to think about\n## Bugs\n- [ ] Crash";
        let mut tasks = parse_tasks(content);
        tasks.push(Task::new("Dark mode", Some("Ideas".into())));
        assert_eq!(
            generate_content(&tasks, Some(content)),
            "## Ideas\nSomething to think about\n- [ ] Dark mode\n## Bugs\n- [ ] Crash"
        );
    }

    #[test]
    fn test_category_header_match_is_case_insensitive() {
        let content = "### ideas\n- [ ] One\n";
        let mut tasks = parse_tasks(content);
        tasks.push(Task::new("Two", Some("IDEAS".into())));
        assert_eq!(
            generate_content(&tasks, Some(content)),
            "### ideas\n- [ ] One\n- [ ] Two\n"
        );
    }

    #[test]
    fn test_insert_past_indented_tasks() {
        let content = "# Work\n- [ ] A\n  - [ ] A.1\n# Home";
        let mut tasks = parse_tasks(content);
        tasks.push(Task::new("B", Some("Work".into())));
        assert_eq!(
            generate_content(&tasks, Some(content)),
            "# Work\n- [ ] A\n  - [ ] A.1\n- [ ] B\n# Home"
        );
    }

    #[test]
    fn test_uncategorized_goes_to_existing_tasks_section() {
        let content = "# Notes\nhello\n\n## tasks\n- [ ] First\n\n## Later\n";
        let mut tasks = parse_tasks(content);
        tasks.push(Task::new("Second", None));
        assert_eq!(
            generate_content(&tasks, Some(content)),
            "# Notes\nhello\n\n## tasks\n- [ ] First\n- [ ] Second\n\n## Later\n"
        );
    }

    #[test]
    fn test_uncategorized_creates_tasks_section() {
        let content = "# Notes\nhello\n";
        let mut tasks = parse_tasks(content);
        tasks.push(Task::new("Loose end", None));
        assert_eq!(
            generate_content(&tasks, Some(content)),
            "# Notes\nhello\n\n\n## Tasks\n- [ ] Loose end\n"
        );
    }

    #[test]
    fn test_completed_new_task() {
        let mut task = Task::new("Already done", Some("Work".into()));
        task.completed = true;
        let out = generate_content(&[task], Some("# Work\n"));
        assert_eq!(out, "# Work\n- [x] Already done\n");
    }

    #[test]
    fn test_new_tasks_keep_insertion_order_within_category() {
        let content = "# Work\n- [ ] A\n";
        let mut tasks = parse_tasks(content);
        tasks.push(Task::new("B", Some("Work".into())));
        tasks.push(Task::new("X", Some("Home".into())));
        tasks.push(Task::new("C", Some("Work".into())));
        assert_eq!(
            generate_content(&tasks, Some(content)),
            "# Work\n- [ ] A\n- [ ] B\n- [ ] C\n\n\n## Home\n\n- [ ] X"
        );
    }

    #[test]
    fn test_existing_text_in_same_category_is_not_duplicated() {
        let content = "# Work\n- [ ] Review PR\n";
        let mut stale = Task::new("Review PR", Some("Work".into()));
        stale.id = "task-stale-id".to_string();
        assert_eq!(generate_content(&[stale], Some(content)), content);
    }

    #[test]
    fn test_uncategorized_matches_tasks_section_by_content() {
        let content = "- [ ] Orphan\n";
        let mut task = Task::new("Orphan", Some("Tasks".into()));
        task.id = "task-other".to_string();
        assert_eq!(generate_content(&[task], Some(content)), content);
    }

    #[test]
    fn test_same_text_other_category_is_added() {
        let content = "# Work\n- [ ] Call Sam\n";
        let mut task = Task::new("Call Sam", Some("Home".into()));
        task.id = "task-other".to_string();
        let out = generate_content(&[task], Some(content));
        assert_eq!(out, "# Work\n- [ ] Call Sam\n\n\n## Home\n\n- [ ] Call Sam");
    }

    #[test]
    fn test_deleted_task_line_is_kept() {
        // removal from the file is not the generator's job; only additions
        // and in-place updates are
        let content = "- [ ] A\n- [ ] B\n";
        let tasks = parse_tasks(content);
        assert_eq!(generate_content(&tasks[..1], Some(content)), content);
    }

    #[test]
    fn test_generate_twice_is_stable() {
        let content = "# Work\n- [ ] A\n";
        let mut tasks = parse_tasks(content);
        tasks.push(Task::new("B", Some("Ideas".into())));
        tasks.push(Task::new("C", None));
        let once = generate_content(&tasks, Some(content));
        let twice = generate_content(&tasks, Some(&once));
        assert_eq!(once, twice);
        assert_eq!(twice.matches("- [ ] B").count(), 1);
        assert_eq!(twice.matches("- [ ] C").count(), 1);
    }

    #[test]
    fn test_insert_into_crlf_file() {
        let content = "# Work\r\n- [ ] A\r\n";
        let mut tasks = parse_tasks(content);
        tasks.push(Task::new("B", Some("Work".into())));
        tasks.push(Task::new("C", Some("Home".into())));
        assert_eq!(
            generate_content(&tasks, Some(content)),
            "# Work\r\n- [ ] A\r\n- [ ] B\r\n\r\n\r\n## Home\r\n\r\n- [ ] C"
        );
    }

    #[test]
    fn test_default_content_without_categories() {
        let mut done = Task::new("Second", None);
        done.completed = true;
        let out = generate_content(&[Task::new("First", None), done], None);
        assert_snapshot!(out, @r"
        # Todo List

        ## Tasks

        - [ ] First
        - [x] Second
        ");
    }

    #[test]
    fn test_default_content_groups_by_first_seen_category() {
        let tasks = vec![
            Task::new("Fix login", Some("Bugs".into())),
            Task::new("Loose", None),
            Task::new("Dark mode", Some("Ideas".into())),
            Task::new("Fix logout", Some("Bugs".into())),
        ];
        assert_eq!(
            generate_content(&tasks, None),
            "# Todo List\n\n## Bugs\n\n- [ ] Fix login\n- [ ] Fix logout\n\n## Tasks\n\n- [ ] Loose\n\n## Ideas\n\n- [ ] Dark mode\n"
        );
    }

    #[test]
    fn test_default_content_empty() {
        assert_eq!(generate_content(&[], None), "# Todo List\n\n## Tasks\n\n");
    }

    #[test]
    fn test_blank_original_uses_default_layout() {
        let tasks = vec![Task::new("First", None)];
        assert_eq!(
            generate_content(&tasks, Some("")),
            generate_content(&tasks, None)
        );
        assert_eq!(generate_content(&[], Some("")), "");
    }

    #[test]
    fn test_default_layout_round_trips() {
        let tasks = vec![
            Task::new("Fix login", Some("Bugs".into())),
            Task::new("Loose", None),
        ];
        let fresh = generate_content(&tasks, None);
        assert_eq!(generate_content(&tasks, Some(&fresh)), fresh);
    }

    #[test]
    fn test_remove_tasks() {
        let content = "# Work\n- [ ] A\n  - [x] B\n- [ ] C\n";
        let tasks = parse_tasks(content);
        assert_eq!(
            remove_tasks(content, &[tasks[1].clone()]),
            "# Work\n- [ ] A\n- [ ] C\n"
        );
        assert_eq!(
            remove_tasks(content, &[tasks[2].clone(), tasks[0].clone()]),
            "# Work\n  - [x] B\n"
        );
    }

    #[test]
    fn test_remove_one_of_duplicates() {
        let content = "- [ ] Same\n- [x] Same\n";
        let tasks = parse_tasks(content);
        assert_eq!(remove_tasks(content, &[tasks[1].clone()]), "- [ ] Same\n");
    }

    #[test]
    fn test_remove_unknown_task_is_noop() {
        let content = "- [ ] A\r\n";
        assert_eq!(remove_tasks(content, &[Task::new("Z", None)]), content);
    }

    #[test]
    fn test_assign_lines() {
        let content = "# Work\n- [ ] A\n\n- [ ] B\n";
        let mut tasks = vec![
            Task::new("B", Some("Work".into())),
            Task::new("Missing", None),
            Task::new("A", Some("Work".into())),
        ];
        assign_lines(&mut tasks, content);
        assert_eq!(tasks[0].line, Some(3));
        assert_eq!(tasks[1].line, None);
        assert_eq!(tasks[2].line, Some(1));
    }

    #[test]
    fn test_stale_line_is_revalidated() {
        let content = "- [ ] A\n- [ ] B\n";
        let mut tasks = parse_tasks(content);
        // B thinks it still lives on line 0
        tasks[1].line = Some(0);
        tasks[1].completed = true;
        assert_eq!(generate_content(&tasks, Some(content)), "- [ ] A\n- [x] B\n");
    }
}
