use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "td", about = concat!("td v", env!("CARGO_PKG_VERSION"), " - a todo list that stays plain markdown"), version)]
pub struct Cli {
    /// Defaults to `list` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different project directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,

    /// Todo file to use instead of the configured one
    #[arg(short = 'f', long = "file", global = true)]
    pub file: Option<String>,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create todo.md and todomd.toml in the current directory
    Init(InitArgs),
    /// List tasks grouped by category
    List(ListArgs),
    /// Add a task
    Add(AddArgs),
    /// Flip a task between open and done
    Toggle(IdArg),
    /// Change a task's text
    Edit(EditArgs),
    /// Delete a task
    Rm(IdArg),
    /// Show completion statistics
    Stats,
    /// List categories with task counts
    Categories,
    /// Re-read the todo file
    Reload,
    /// Follow the todo file and print every change
    Watch,
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing todo file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Default)]
pub struct ListArgs {
    /// Only this category (case-insensitive)
    #[arg(long)]
    pub category: Option<String>,
    /// Only open tasks
    #[arg(long, conflicts_with = "done")]
    pub pending: bool,
    /// Only completed tasks
    #[arg(long)]
    pub done: bool,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task text
    pub text: String,
    /// Section to file the task under (created if missing)
    #[arg(long, short = 'c')]
    pub category: Option<String>,
}

#[derive(Args)]
pub struct IdArg {
    /// Task id, or a unique prefix of one
    pub id: String,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task id, or a unique prefix of one
    pub id: String,
    /// New text
    pub text: String,
}
