mod init;
pub use init::cmd_init;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::todo_io;
use crate::io::watcher::TodoWatcher;
use crate::model::config::Config;
use crate::model::task::Task;
use crate::ops::task_ops;
use crate::sync::{Reconciler, SaveOutcome};

/// How often `watch` checks for file events and expired timers
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Environment variable that overrides the configured log filter
const LOG_ENV: &str = "TODOMD_LOG";

/// Resolved project: where it lives, its config and the todo file.
pub struct Workspace {
    pub root: PathBuf,
    pub config: Config,
    pub todo_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;
    let start = start_dir(cli.project_dir.as_deref())?;
    let command = cli.command.unwrap_or(Commands::List(ListArgs::default()));

    // Init works on the start directory itself, before discovery
    let command = match command {
        Commands::Init(args) => {
            init_logging(&Config::default().log.level, cli.verbose);
            return cmd_init(args, &start, cli.file.as_deref());
        }
        cmd => cmd,
    };

    let ws = load_workspace(&start, cli.file.as_deref())?;
    init_logging(&ws.config.log.level, cli.verbose);
    tracing::debug!(root = %ws.root.display(), file = %ws.todo_path.display(), "workspace");

    match command {
        Commands::Init(_) => Ok(()),
        Commands::List(args) => cmd_list(&ws, args, json),
        Commands::Add(args) => cmd_add(&ws, args, json),
        Commands::Toggle(args) => cmd_toggle(&ws, args, json),
        Commands::Edit(args) => cmd_edit(&ws, args, json),
        Commands::Rm(args) => cmd_rm(&ws, args, json),
        Commands::Stats => cmd_stats(&ws, json),
        Commands::Categories => cmd_categories(&ws, json),
        Commands::Reload => cmd_reload(&ws, json),
        Commands::Watch => cmd_watch(&ws, json),
    }
}

fn start_dir(project_dir: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match project_dir {
        Some(dir) => Ok(std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?),
        None => Ok(std::env::current_dir()?),
    }
}

/// Find the project root above `start`, read its config and pick the todo
/// file. An explicit `file` is taken relative to `start`.
pub fn load_workspace(
    start: &Path,
    file: Option<&str>,
) -> Result<Workspace, Box<dyn std::error::Error>> {
    let root = todo_io::discover_root(start);
    let config = config_io::read_config(&root)?;
    let todo_path = match file {
        Some(f) => start.join(f),
        None => root.join(&config.file.name),
    };
    Ok(Workspace {
        root,
        config,
        todo_path,
    })
}

/// Send tracing output to stderr. `TODOMD_LOG` wins over the config, and
/// each `-v` raises the level one step.
fn init_logging(level: &str, verbose: u8) {
    let level = match verbose {
        0 => level,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Open the todo file. An unreadable file is reported and treated as empty.
fn open(ws: &Workspace) -> Reconciler {
    let rec = Reconciler::open(&ws.todo_path, ws.config.sync);
    if let Some(e) = rec.load_error() {
        eprintln!("warning: {}", e);
    }
    rec
}

/// Flush outstanding writes and turn a failed save into an error.
fn finish(rec: &mut Reconciler) -> Result<(), Box<dyn std::error::Error>> {
    rec.settle();
    match rec.last_save() {
        SaveOutcome::Failed(message) => {
            Err(format!("could not save {}: {}", rec.path().display(), message).into())
        }
        _ => Ok(()),
    }
}

fn print_task(task: &Task, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(task)?);
    } else {
        println!("{}", task.id);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(ws: &Workspace, args: ListArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let rec = open(ws);
    let wanted = args.category.as_deref().map(str::to_lowercase);

    let mut groups = Vec::new();
    for (category, tasks) in rec.tasks_by_category() {
        if let Some(ref wanted) = wanted
            && category.to_lowercase() != *wanted
        {
            continue;
        }
        let tasks: Vec<_> = tasks
            .into_iter()
            .filter(|t| !(args.pending && t.completed) && !(args.done && !t.completed))
            .collect();
        if !tasks.is_empty() {
            groups.push(TaskListJson { category, tasks });
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }
    if groups.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", format_category_header(&group.category, &group.tasks));
        for task in &group.tasks {
            println!("{}", format_task_line(task));
        }
    }
    Ok(())
}

fn cmd_stats(ws: &Workspace, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let rec = open(ws);
    let stats = rec.stats();
    if json {
        let out = StatsJson {
            file: ws.todo_path.display().to_string(),
            stats,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for line in format_stats(&stats) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_categories(ws: &Workspace, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let rec = open(ws);
    let categories: Vec<CategoryJson> = rec
        .tasks_by_category()
        .into_iter()
        .map(|(name, tasks)| CategoryJson {
            name,
            total: tasks.len(),
            completed: tasks.iter().filter(|t| t.completed).count(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&categories)?);
    } else {
        for c in &categories {
            println!("{}  {}/{}", c.name, c.completed, c.total);
        }
    }
    Ok(())
}

fn cmd_reload(ws: &Workspace, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open(ws);
    rec.force_reload();
    let count = rec.tasks().len();
    if json {
        let out = ReloadJson {
            file: ws.todo_path.display().to_string(),
            tasks: count,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{} tasks", count);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(ws: &Workspace, args: AddArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open(ws);
    let task = rec.add_task(&args.text, args.category.as_deref())?;
    finish(&mut rec)?;
    print_task(&task, json)
}

fn cmd_toggle(ws: &Workspace, args: IdArg, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open(ws);
    let id = task_ops::resolve_id(rec.tasks(), &args.id)?;
    let task = rec.toggle_task(&id)?;
    finish(&mut rec)?;
    print_task(&task, json)
}

fn cmd_edit(ws: &Workspace, args: EditArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open(ws);
    let id = task_ops::resolve_id(rec.tasks(), &args.id)?;
    let task = rec.update_task(&id, &args.text)?;
    finish(&mut rec)?;
    print_task(&task, json)
}

fn cmd_rm(ws: &Workspace, args: IdArg, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open(ws);
    let id = task_ops::resolve_id(rec.tasks(), &args.id)?;
    let task = rec.delete_task(&id)?;
    finish(&mut rec)?;
    print_task(&task, json)
}

// ---------------------------------------------------------------------------
// Watch
// ---------------------------------------------------------------------------

fn cmd_watch(ws: &Workspace, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open(ws);
    let sub = rec.subscribe();
    let watcher = TodoWatcher::start(rec.path())?;
    tracing::info!(path = %rec.path().display(), "watching");
    if !json {
        println!(
            "watching {} ({} tasks), ctrl-c to stop",
            rec.path().display(),
            rec.tasks().len()
        );
    }

    loop {
        for event in watcher.poll() {
            rec.handle_file_event(event);
        }
        rec.tick();
        for event in sub.poll() {
            if json {
                println!("{}", serde_json::to_string(&event)?);
            } else {
                println!("{}", format_event(&event));
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}
