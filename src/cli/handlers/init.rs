use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::{config_io, todo_io};

pub fn cmd_init(
    args: InitArgs,
    dir: &Path,
    file: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    // An existing config decides the file name
    let config = config_io::read_config(dir)?;
    let todo_path = match file {
        Some(f) => dir.join(f),
        None => dir.join(&config.file.name),
    };

    todo_io::init_todo(&todo_path, args.force)?;
    println!("Created {}", todo_path.display());

    if config_io::write_default_config(dir)? {
        println!("Created {}", dir.join(config_io::CONFIG_FILE).display());
    }
    Ok(())
}
