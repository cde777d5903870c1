pub mod span;
pub mod task_generator;
pub mod task_parser;

pub use span::TaskLine;
pub use task_generator::{assign_lines, default_content, generate_content, remove_tasks};
pub use task_parser::{parse_header, parse_task_line, parse_tasks};
