#![allow(clippy::unwrap_used)]

use super::*;

// ── Schema ────────────────────────────────────────────────────

#[test]
fn test_fresh_database_is_at_current_version() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.schema_version().unwrap(), schema::CURRENT_VERSION);
}

#[test]
fn test_reopen_keeps_data_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predger.db");
    {
        let db = Database::open(&path).unwrap();
        db.set_item("predger.items", "[]").unwrap();
    }
    let db = Database::open(&path).unwrap();
    assert_eq!(db.schema_version().unwrap(), schema::CURRENT_VERSION);
    assert_eq!(db.get_item("predger.items").unwrap().as_deref(), Some("[]"));
}

// ── Local storage ─────────────────────────────────────────────

#[test]
fn test_get_missing_key() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.get_item("nope").unwrap().is_none());
}

#[test]
fn test_set_overwrites() {
    let db = Database::open_in_memory().unwrap();
    db.set_item("k", "one").unwrap();
    db.set_item("k", "two").unwrap();
    assert_eq!(db.get_item("k").unwrap().as_deref(), Some("two"));
}

#[test]
fn test_keys_are_independent() {
    let db = Database::open_in_memory().unwrap();
    db.set_item("predger.items", "[1]").unwrap();
    db.set_item("predger.agent.version", "predger-v1").unwrap();
    assert_eq!(db.get_item("predger.items").unwrap().as_deref(), Some("[1]"));
    assert_eq!(
        db.get_item("predger.agent.version").unwrap().as_deref(),
        Some("predger-v1")
    );
}

// ── Background writer ─────────────────────────────────────────

#[test]
fn test_writer_applies_writes_in_order() {
    let writer = StorageWriter::spawn(Database::open_in_memory().unwrap()).unwrap();
    for i in 0..50 {
        writer.set_item("k", &i.to_string()).unwrap();
    }
    writer.flush().unwrap();
    assert_eq!(writer.get_item("k").unwrap().as_deref(), Some("49"));
    assert!(writer.take_write_error().is_none());
}

#[test]
fn test_writer_persists_to_file_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predger.db");
    {
        let writer = StorageWriter::spawn(Database::open(&path).unwrap()).unwrap();
        writer.set_item("predger.items", r#"[{"id":"a","value":1}]"#).unwrap();
    }
    let db = Database::open(&path).unwrap();
    assert_eq!(
        db.get_item("predger.items").unwrap().as_deref(),
        Some(r#"[{"id":"a","value":1}]"#)
    );
}
