mod cli;
mod tui;

use anyhow::{Context, Result};
use std::path::Path;

pub(crate) use cli::as_cli;
pub(crate) use tui::as_tui;

use crate::config::Config;
use crate::db::{Database, LocalStorage, StorageWriter};
use crate::ledger::{write_csv, Ledger};
use crate::models::Item;

/// Open the ledger over the database at `db_path`. When `background` is set,
/// writes go through a `StorageWriter` so the caller never waits on disk.
/// Storage that cannot be opened leaves the ledger in memory-only mode.
pub(crate) fn open_ledger(config: &Config, db_path: &Path, background: bool) -> Ledger {
    let storage: Option<Box<dyn LocalStorage>> = match Database::open(db_path) {
        Ok(db) if background => match StorageWriter::spawn(db) {
            Ok(writer) => Some(Box::new(writer)),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "storage writer unavailable");
                None
            }
        },
        Ok(db) => Some(Box::new(db)),
        Err(e) => {
            tracing::error!(path = %db_path.display(), error = %format!("{e:#}"), "local storage unavailable");
            None
        }
    };
    Ledger::initialize(storage, &config.storage_key, config.categories.clone())
}

/// Write `items` to a CSV file. Nothing is written for an empty ledger.
pub(crate) fn export_items(items: &[Item], path: &str) -> Result<usize> {
    if items.is_empty() {
        return Ok(0);
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create export file: {path}"))?;
    let count = write_csv(items, file)?;
    tracing::info!(path, count, "exported items");
    Ok(count)
}

pub(crate) fn default_export_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    let date = chrono::Local::now().format("%Y-%m-%d");
    format!("{home}/predger-export-{date}.csv")
}

pub(crate) fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}
