#![allow(clippy::unwrap_used)]

use rust_decimal_macros::dec;

use super::app::{App, InputMode, PendingAction};
use super::commands::{find_closest, handle_command, levenshtein};
use crate::ledger::{Confirmation, Ledger};
use crate::models::DEFAULT_CATEGORIES;

fn app() -> App {
    let categories = DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect();
    App::new(Ledger::initialize(None, "predger.items", categories), None)
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn test_unavailable_storage_warning_shown_once() {
    let mut app = app();
    assert_eq!(app.status_message, crate::ledger::UNAVAILABLE_WARNING);
    assert!(app.ledger.take_warning().is_none());
    app.set_status("");
    app.poll_background();
    assert!(app.status_message.is_empty());
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn test_add_command() {
    let mut app = app();
    handle_command("add 45.00 food", &mut app).unwrap();
    handle_command("a -10.50 Fuel", &mut app).unwrap();

    assert_eq!(app.ledger.items().len(), 2);
    assert_eq!(app.ledger.items()[0].category, "Fuel");
    assert_eq!(app.ledger.items()[1].category, "Food");
    assert_eq!(app.ledger.total(), dec!(34.50));
    assert_eq!(app.status_message, "Added -$10.50 Fuel");
}

#[test]
fn test_add_command_rejects_bad_input() {
    let mut app = app();
    handle_command("add lots", &mut app).unwrap();
    assert!(app.ledger.items().is_empty());
    assert_eq!(app.status_message, "Not a number: lots");

    handle_command("add 5 Rent", &mut app).unwrap();
    assert!(app.ledger.items().is_empty());
    assert!(app.status_message.starts_with("Unknown category"));
}

#[test]
fn test_add_without_args_opens_form() {
    let mut app = app();
    handle_command("add", &mut app).unwrap();
    assert_eq!(app.input_mode, InputMode::Editing);
}

#[test]
fn test_delete_command_removes_selected() {
    let mut app = app();
    handle_command("add 1", &mut app).unwrap();
    handle_command("add 2", &mut app).unwrap();
    app.item_index = 1;

    handle_command("delete", &mut app).unwrap();

    assert_eq!(app.ledger.items().len(), 1);
    assert_eq!(app.ledger.items()[0].value, dec!(2));
    assert_eq!(app.item_index, 0);
}

#[test]
fn test_delete_with_nothing_selected() {
    let mut app = app();
    handle_command("delete", &mut app).unwrap();
    assert_eq!(app.status_message, "No item selected");
}

#[test]
fn test_category_command() {
    let mut app = app();
    handle_command("category hobby", &mut app).unwrap();
    assert_eq!(app.ledger.state().new_item_category, "Hobby");
    assert_eq!(app.status_message, "Next item: Hobby");

    handle_command("cat Rent", &mut app).unwrap();
    assert_eq!(app.ledger.state().new_item_category, "Hobby");
    assert_eq!(app.status_message, "Unknown category: Rent");
}

#[test]
fn test_export_command_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");
    let mut app = app();
    handle_command("add 3.25 Food", &mut app).unwrap();

    handle_command(&format!("export {}", path.display()), &mut app).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("id,created_at,category,value"));
    assert!(written.contains(",Food,3.25"));
    assert!(app.status_message.starts_with("Exported 1 items"));
}

#[test]
fn test_unknown_command_suggests() {
    let mut app = app();
    handle_command("rest", &mut app).unwrap();
    assert_eq!(
        app.status_message,
        "Unknown command: :rest. Did you mean :reset?"
    );
}

#[test]
fn test_cache_activate_without_agent() {
    let mut app = app();
    handle_command("cache-activate", &mut app).unwrap();
    assert_eq!(app.status_message, "Offline cache is disabled");
}

#[test]
fn test_quit_command() {
    let mut app = app();
    handle_command("q", &mut app).unwrap();
    assert!(!app.running);
}

// ── Reset confirmation ────────────────────────────────────────

#[test]
fn test_reset_requires_confirmation() {
    let mut app = app();
    handle_command("add 10", &mut app).unwrap();
    handle_command("reset", &mut app).unwrap();

    assert_eq!(app.input_mode, InputMode::Confirm);
    assert_eq!(app.pending_action, Some(PendingAction::Reset));
    assert_eq!(app.ledger.items().len(), 1);

    app.resolve_pending(Confirmation::Cancelled);
    assert_eq!(app.input_mode, InputMode::Normal);
    assert_eq!(app.ledger.items().len(), 1);

    handle_command("reset", &mut app).unwrap();
    app.resolve_pending(Confirmation::Confirmed);
    assert!(app.ledger.items().is_empty());
    assert_eq!(app.status_message, "All items deleted");
}

#[test]
fn test_reset_on_empty_ledger_does_not_prompt() {
    let mut app = app();
    handle_command("reset", &mut app).unwrap();
    assert_eq!(app.input_mode, InputMode::Normal);
    assert!(app.pending_action.is_none());
}

// ── Form ──────────────────────────────────────────────────────

#[test]
fn test_submit_form_adds_and_clears() {
    let mut app = app();
    app.ledger.set_new_item_value("12.5");
    app.ledger.cycle_category(1);

    assert!(app.submit_item());

    assert_eq!(app.ledger.items()[0].value, dec!(12.5));
    assert_eq!(app.ledger.items()[0].category, "Food");
    assert!(app.ledger.state().new_item_value.is_empty());
}

#[test]
fn test_submit_invalid_form_keeps_input() {
    let mut app = app();
    app.ledger.set_new_item_value("-");
    assert!(!app.submit_item());
    assert_eq!(app.ledger.state().new_item_value, "-");
}

// ── Fuzzy matching ────────────────────────────────────────────

#[test]
fn test_levenshtein() {
    assert_eq!(levenshtein("", "abc"), 3);
    assert_eq!(levenshtein("kitten", "sitting"), 3);
    assert_eq!(levenshtein("same", "same"), 0);
}

#[test]
fn test_find_closest_skips_short_aliases() {
    assert_eq!(find_closest("qui"), "quit");
    assert_eq!(find_closest("exprot"), "export");
}
