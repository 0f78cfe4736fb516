use std::collections::HashMap;
use std::sync::LazyLock;

use super::app::{App, InputMode};
use crate::models::find_category;

pub(crate) struct Command {
    pub(crate) description: &'static str,
    pub(crate) run: fn(&str, &mut App) -> anyhow::Result<()>,
}

macro_rules! register_command {
    ($name:expr, $desc:expr, $func:expr, $registry:expr) => {{
        $registry.insert(
            $name,
            Command {
                description: $desc,
                run: $func,
            },
        );
    }};
}

pub(crate) static COMMANDS: LazyLock<HashMap<&str, Command>> = LazyLock::new(|| {
    let mut r: HashMap<&str, Command> = HashMap::new();

    register_command!("q", "Quit Predger", cmd_quit, r);
    register_command!("quit", "Quit Predger", cmd_quit, r);
    register_command!("help", "Show available commands", cmd_help, r);
    register_command!("h", "Show available commands", cmd_help, r);
    register_command!(
        "add",
        "Add an item (e.g. :add -12.50 Fuel)",
        cmd_add,
        r
    );
    register_command!("a", "Add an item (e.g. :a 45 Food)", cmd_add, r);
    register_command!("delete", "Delete selected item", cmd_delete, r);
    register_command!("reset", "Delete every item (asks first)", cmd_reset, r);
    register_command!(
        "category",
        "Set category for the next item (e.g. :category Hobby)",
        cmd_category,
        r
    );
    register_command!("cat", "Set category for the next item", cmd_category, r);
    register_command!(
        "export",
        "Export items to CSV (e.g. :export ~/predger.csv)",
        cmd_export,
        r
    );
    register_command!(
        "cache-activate",
        "Activate a waiting offline cache now",
        cmd_cache_activate,
        r
    );

    r
});

pub(crate) fn handle_command(input: &str, app: &mut App) -> anyhow::Result<()> {
    let trimmed = input.trim();
    let mut parts = trimmed.splitn(2, ' ');
    let cmd_name = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim();

    if let Some(cmd) = COMMANDS.get(cmd_name) {
        (cmd.run)(args, app)?;
    } else {
        let suggestion = find_closest(cmd_name);
        app.set_status(format!(
            "Unknown command: :{cmd_name}. Did you mean :{suggestion}?"
        ));
    }

    Ok(())
}

pub(crate) fn find_closest(input: &str) -> String {
    COMMANDS
        .keys()
        .filter(|k| k.len() > 1) // skip single-letter aliases for suggestions
        .min_by_key(|k| (levenshtein(input, k), **k))
        .unwrap_or(&"help")
        .to_string()
}

pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

// ── Command implementations ──────────────────────────────────

fn cmd_quit(_args: &str, app: &mut App) -> anyhow::Result<()> {
    app.running = false;
    Ok(())
}

fn cmd_help(_args: &str, app: &mut App) -> anyhow::Result<()> {
    app.show_help = true;
    Ok(())
}

fn cmd_add(args: &str, app: &mut App) -> anyhow::Result<()> {
    let mut parts = args.split_whitespace();
    let Some(amount) = parts.next() else {
        app.input_mode = InputMode::Editing;
        return Ok(());
    };
    let category = parts.next();

    if app.add_item(amount, category) {
        let msg = app
            .ledger
            .items()
            .first()
            .map(|item| {
                format!(
                    "Added {} {}",
                    crate::ledger::format_currency(item.value),
                    item.category
                )
            })
            .unwrap_or_default();
        app.set_status(msg);
    } else if category.is_some_and(|c| find_category(app.ledger.categories(), c).is_none()) {
        app.set_status(format!(
            "Unknown category. Choose from: {}",
            app.ledger.categories().join(", ")
        ));
    } else {
        app.set_status(format!("Not a number: {amount}"));
    }
    Ok(())
}

fn cmd_delete(_args: &str, app: &mut App) -> anyhow::Result<()> {
    match app.remove_selected() {
        Some(item) => app.set_status(format!(
            "Deleted {} {}",
            crate::ledger::format_currency(item.value),
            item.category
        )),
        None => app.set_status("No item selected"),
    }
    Ok(())
}

fn cmd_reset(_args: &str, app: &mut App) -> anyhow::Result<()> {
    app.request_reset();
    Ok(())
}

fn cmd_category(args: &str, app: &mut App) -> anyhow::Result<()> {
    if args.is_empty() {
        app.set_status(format!(
            "Categories: {}",
            app.ledger.categories().join(", ")
        ));
        return Ok(());
    }
    if find_category(app.ledger.categories(), args).is_none() {
        app.set_status(format!("Unknown category: {args}"));
        return Ok(());
    }
    app.ledger.set_new_item_category(args);
    let current = app.ledger.state().new_item_category.clone();
    app.set_status(format!("Next item: {current}"));
    Ok(())
}

fn cmd_export(args: &str, app: &mut App) -> anyhow::Result<()> {
    let path = if args.is_empty() {
        crate::run::default_export_path()
    } else {
        crate::run::shellexpand(args)
    };

    let count = crate::run::export_items(app.ledger.items(), &path)?;
    if count == 0 {
        app.set_status("No items to export");
    } else {
        app.set_status(format!("Exported {count} items to {path}"));
    }
    Ok(())
}

fn cmd_cache_activate(_args: &str, app: &mut App) -> anyhow::Result<()> {
    app.activate_agent();
    Ok(())
}
