use std::ops::Range;

/// Byte layout of a task line, so a rewrite can touch only what changed.
/// Offsets are into the line with any trailing `\r` already removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLine {
    /// Leading whitespace
    pub indent: Range<usize>,
    /// The single character between `[` and `]`
    pub checkbox: Range<usize>,
    /// Everything after the checkbox and its following whitespace
    pub text: Range<usize>,
    pub completed: bool,
}

impl TaskLine {
    pub fn indent<'a>(&self, line: &'a str) -> &'a str {
        &line[self.indent.clone()]
    }

    pub fn text<'a>(&self, line: &'a str) -> &'a str {
        &line[self.text.clone()]
    }
}
