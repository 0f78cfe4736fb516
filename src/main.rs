mod config;
mod db;
mod ledger;
mod logging;
mod models;
mod offline;
mod run;
mod ui;

use anyhow::{Context, Result};
use std::path::PathBuf;

fn main() -> Result<()> {
    let mut args: Vec<String> = std::env::args().collect();
    let config_path = take_config_flag(&mut args)?;

    let dirs = directories::ProjectDirs::from("com", "predger", "Predger")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

    let _log_guard = match logging::init(&data_dir.join("logs")) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {e:#}");
            None
        }
    };

    let config = config::Config::load(config_path.as_deref(), Some(dirs.config_dir()))?;
    let db_path = data_dir.join("predger.db");
    tracing::info!(db = %db_path.display(), "starting predger");

    if args.len() == 1 {
        run::as_tui(&config, &db_path)
    } else {
        run::as_cli(&args, &config, &db_path)
    }
}

/// Remove `--config <path>` (or `--config=<path>`) from `args`.
fn take_config_flag(args: &mut Vec<String>) -> Result<Option<PathBuf>> {
    let Some(pos) = args
        .iter()
        .position(|a| a == "--config" || a.starts_with("--config="))
    else {
        return Ok(None);
    };

    let flag = args.remove(pos);
    if let Some(value) = flag.strip_prefix("--config=") {
        return Ok(Some(PathBuf::from(run::shellexpand(value))));
    }
    if pos >= args.len() {
        anyhow::bail!("--config requires a path");
    }
    let value = args.remove(pos);
    Ok(Some(PathBuf::from(run::shellexpand(&value))))
}
