use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::db::Database;
use crate::ledger::{format_currency, Confirmation, Ledger};
use crate::models::{find_category, ItemId};
use crate::offline::{
    self, CacheStorage, FetchOutcome, HttpNetwork, OfflineAgent, RegistrationOutcome, Request,
    SqliteCache,
};

pub(crate) fn as_cli(args: &[String], config: &Config, db_path: &Path) -> Result<()> {
    match args[1].as_str() {
        "add" | "a" => cli_add(&args[2..], config, db_path),
        "list" | "ls" => cli_list(config, db_path),
        "remove" | "rm" => cli_remove(&args[2..], config, db_path),
        "reset" => cli_reset(&args[2..], config, db_path),
        "total" => cli_total(config, db_path),
        "export" => cli_export(&args[2..], config, db_path),
        "cache" => cli_cache(&args[2..], config, db_path),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("predger {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("Predger - a running ledger of what you spend and earn");
    println!();
    println!("Usage: predger [--config <file>] [command]");
    println!();
    println!("Commands:");
    println!("  (none)                        Launch interactive TUI");
    println!("  add <amount> [category]      Add an item (negative amounts are spending)");
    println!("  list                          List items, newest first");
    println!("  remove <id>                   Remove an item");
    println!("  reset --yes                   Delete every item");
    println!("  total                         Print the running total");
    println!("  export [path]                 Export items to CSV");
    println!("  cache sync                    Install and activate the offline cache");
    println!("  cache fetch <url>             Fetch a URL through the offline cache");
    println!("  cache list                    List cache buckets");
    println!("  cache message <json>          Post a message to the offline cache");
    println!("  --help, -h                    Show this help");
    println!("  --version, -V                 Show version");
}

fn open(config: &Config, db_path: &Path) -> Ledger {
    let mut ledger = super::open_ledger(config, db_path, false);
    if let Some(warning) = ledger.take_warning() {
        eprintln!("Warning: {warning}");
    }
    ledger
}

fn check_saved(ledger: &mut Ledger) -> Result<()> {
    match ledger.take_storage_error() {
        Some(e) => bail!(e),
        None => Ok(()),
    }
}

fn cli_add(args: &[String], config: &Config, db_path: &Path) -> Result<()> {
    let Some(amount) = args.first() else {
        bail!("Usage: predger add <amount> [category]");
    };
    let category = args.get(1).map(String::as_str);

    let mut ledger = open(config, db_path);
    if !ledger.add_item(amount, category) {
        match category {
            Some(c) if find_category(ledger.categories(), c).is_none() => bail!(
                "Unknown category '{c}'. Choose from: {}",
                ledger.categories().join(", ")
            ),
            _ => bail!("Not a number: {amount}"),
        }
    }
    check_saved(&mut ledger)?;

    if let Some(item) = ledger.items().first() {
        println!(
            "Added {} {} ({})",
            format_currency(item.value),
            item.category,
            item.id
        );
    }
    println!("Total: {}", format_currency(ledger.total()));
    Ok(())
}

fn cli_list(config: &Config, db_path: &Path) -> Result<()> {
    let ledger = open(config, db_path);
    if ledger.items().is_empty() {
        println!("No items");
        return Ok(());
    }

    println!("{:<36}  {:<16}  {:<12} {:>12}", "ID", "Added", "Category", "Amount");
    println!("{}", "─".repeat(80));
    for item in ledger.items() {
        println!(
            "{:<36}  {:<16}  {:<12} {:>12}",
            item.id,
            item.created_label(),
            item.category,
            format_currency(item.value),
        );
    }
    println!("{}", "─".repeat(80));
    println!("{:<68} {:>12}", "Total", format_currency(ledger.total()));
    Ok(())
}

fn cli_remove(args: &[String], config: &Config, db_path: &Path) -> Result<()> {
    let Some(id) = args.first() else {
        bail!("Usage: predger remove <id>");
    };
    let mut ledger = open(config, db_path);
    if ledger.remove_item(&ItemId::from(id.as_str())) {
        check_saved(&mut ledger)?;
        println!("Removed {id}");
    } else {
        println!("No item with id {id}");
    }
    println!("Total: {}", format_currency(ledger.total()));
    Ok(())
}

fn cli_reset(args: &[String], config: &Config, db_path: &Path) -> Result<()> {
    let confirmation = if args.iter().any(|a| a == "--yes" || a == "-y") {
        Confirmation::Confirmed
    } else {
        Confirmation::Cancelled
    };
    let mut ledger = open(config, db_path);
    let count = ledger.items().len();
    if !ledger.reset(confirmation) {
        if confirmation == Confirmation::Cancelled {
            println!("Reset cancelled. Pass --yes to delete all {count} items.");
        }
        return Ok(());
    }
    check_saved(&mut ledger)?;
    println!("Deleted {count} items");
    Ok(())
}

fn cli_total(config: &Config, db_path: &Path) -> Result<()> {
    let ledger = open(config, db_path);
    println!("{}", format_currency(ledger.total()));
    Ok(())
}

fn cli_export(args: &[String], config: &Config, db_path: &Path) -> Result<()> {
    let output_path = args
        .first()
        .filter(|a| !a.starts_with('-'))
        .map(|a| super::shellexpand(a))
        .unwrap_or_else(super::default_export_path);

    let ledger = open(config, db_path);
    let count = super::export_items(ledger.items(), &output_path)?;
    if count == 0 {
        println!("No items to export");
    } else {
        println!("Exported {count} items to {output_path}");
    }
    Ok(())
}

// ── Offline cache ────────────────────────────────────────────

type CliAgent = OfflineAgent<SqliteCache, HttpNetwork>;

fn build_agent(config: &Config, db_path: &Path) -> Result<(CliAgent, Database)> {
    let cache = SqliteCache::open(db_path)?;
    let network = HttpNetwork::new(config.cache.origin_url()?)?;
    let agent = OfflineAgent::new(config.cache.clone(), cache, network)?;
    let storage = Database::open(db_path)?;
    Ok((agent, storage))
}

fn cli_cache(args: &[String], config: &Config, db_path: &Path) -> Result<()> {
    let Some(sub) = args.first() else {
        bail!("Usage: predger cache <sync|fetch|list|message>");
    };
    match sub.as_str() {
        "sync" => cache_sync(config, db_path),
        "fetch" => cache_fetch(&args[1..], config, db_path),
        "list" | "ls" => cache_list(config, db_path),
        "message" | "msg" => cache_message(&args[1..], config, db_path),
        other => bail!("Unknown cache command: {other}"),
    }
}

fn print_outcome(outcome: &RegistrationOutcome, version: &str) {
    match outcome {
        RegistrationOutcome::Resumed => println!("Offline cache {version} is already active"),
        RegistrationOutcome::Activated { deleted } => {
            println!("Offline cache {version} installed and activated");
            for name in deleted {
                println!("  removed old cache {name}");
            }
        }
        RegistrationOutcome::Waiting => {
            println!("Offline cache {version} installed, waiting for open clients to close");
        }
    }
}

fn cache_sync(config: &Config, db_path: &Path) -> Result<()> {
    let (mut agent, storage) = build_agent(config, db_path)?;
    let outcome = offline::register(&mut agent, &storage, 0)?;
    print_outcome(&outcome, &config.cache.version);
    let count = agent.cache().entry_count(agent.config().cache_name())?;
    println!("{count} cached entries");
    Ok(())
}

fn cache_fetch(args: &[String], config: &Config, db_path: &Path) -> Result<()> {
    let Some(raw) = args.first() else {
        bail!("Usage: predger cache fetch <url>");
    };
    let url = config
        .cache
        .origin_url()?
        .join(raw)
        .with_context(|| format!("Invalid URL: {raw}"))?;

    let (mut agent, storage) = build_agent(config, db_path)?;
    if !offline::resume_recorded(&mut agent, &storage)? {
        bail!("Offline cache is not active. Run `predger cache sync` first.");
    }

    let outcome = agent.handle_fetch(&Request::get(url.clone()))?;
    let source = match &outcome {
        FetchOutcome::Cached(_) => "cache",
        FetchOutcome::Network(_) => "network",
        FetchOutcome::Passthrough => "passthrough",
    };
    if let Some(response) = outcome.response() {
        println!(
            "{url}  {}  {} bytes  from {source}",
            response.status,
            response.body.len()
        );
    }
    Ok(())
}

fn cache_list(config: &Config, db_path: &Path) -> Result<()> {
    let (agent, storage) = build_agent(config, db_path)?;
    let recorded = storage.get_item(offline::VERSION_KEY)?;
    let names = agent.cache().bucket_names()?;
    if names.is_empty() {
        println!("No cache buckets");
        return Ok(());
    }

    println!("{:<24} {:>8}  Status", "Bucket", "Entries");
    println!("{}", "─".repeat(44));
    for name in &names {
        let status = if recorded.as_deref() == Some(name.as_str()) {
            "active"
        } else if name == agent.config().cache_name() {
            "installed"
        } else {
            "stale"
        };
        println!("{name:<24} {:>8}  {status}", agent.cache().entry_count(name)?);
    }
    Ok(())
}

fn cache_message(args: &[String], config: &Config, db_path: &Path) -> Result<()> {
    let Some(payload) = args.first() else {
        bail!("Usage: predger cache message '{{\"type\":\"SKIP_WAITING\"}}'");
    };
    let (mut agent, storage) = build_agent(config, db_path)?;

    // The CLI itself counts as an open client of the previous version.
    let outcome = offline::register(&mut agent, &storage, 1)?;
    if !agent.handle_message(payload) {
        println!("Message not recognized: {payload}");
        return Ok(());
    }
    if outcome == RegistrationOutcome::Waiting && agent.may_activate(1) {
        let report = agent.activate()?;
        offline::record_active(&agent, &storage)?;
        print_outcome(
            &RegistrationOutcome::Activated {
                deleted: report.deleted,
            },
            &config.cache.version,
        );
    } else {
        print_outcome(&outcome, &config.cache.version);
    }
    Ok(())
}
