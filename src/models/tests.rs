#![allow(clippy::unwrap_used)]

use rust_decimal_macros::dec;

use super::*;

fn categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

// ── Item ──────────────────────────────────────────────────────

#[test]
fn test_new_ids_are_distinct() {
    let a = ItemId::new_v4();
    let b = ItemId::new_v4();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), 36);
}

#[test]
fn test_item_serializes_with_camel_case_fields() {
    let item = Item::new("abc".into(), dec!(45.5), "Food".into(), 1_700_000_000_000);
    let json = serde_json::to_value(&item).unwrap();
    assert_eq!(json["id"], "abc");
    assert_eq!(json["value"], 45.5);
    assert_eq!(json["category"], "Food");
    assert_eq!(json["createdAt"], 1_700_000_000_000_i64);
}

#[test]
fn test_item_reads_current_shape() {
    let json = r#"{"id":"x-1","value":-10.5,"createdAt":1700000000000,"category":"Fuel"}"#;
    let item: Item = serde_json::from_str(json).unwrap();
    assert_eq!(item.id.as_str(), "x-1");
    assert_eq!(item.value, dec!(-10.5));
    assert_eq!(item.category, "Fuel");
    assert_eq!(item.created_at, 1_700_000_000_000);
}

#[test]
fn test_item_reads_legacy_shape() {
    // Early snapshots: numeric timestamp id, no category, no createdAt
    let json = r#"[{"id":1480000000000,"value":12},{"id":1480000000001,"value":0.25}]"#;
    let items: Vec<Item> = serde_json::from_str(json).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id.as_str(), "1480000000000");
    assert_eq!(items[0].value, dec!(12));
    assert!(items[0].category.is_empty());
    assert_eq!(items[0].created_at, 0);
    assert_eq!(items[1].value, dec!(0.25));
}

#[test]
fn test_created_label_empty_for_legacy() {
    let item = Item::new("a".into(), dec!(1), "Food".into(), 0);
    assert!(item.created_label().is_empty());
    let item = Item::new("a".into(), dec!(1), "Food".into(), 1_700_000_000_000);
    assert!(item.created_label().starts_with("2023-11-1"));
}

// ── Categories ────────────────────────────────────────────────

#[test]
fn test_find_category_case_insensitive() {
    let cats = categories();
    assert_eq!(find_category(&cats, "food"), Some("Food"));
    assert_eq!(find_category(&cats, " HOBBY "), Some("Hobby"));
    assert_eq!(find_category(&cats, "Rent"), None);
}

#[test]
fn test_cycle_category_wraps() {
    let cats = categories();
    assert_eq!(cycle_category(&cats, "Clothing", 1), Some("Food"));
    assert_eq!(cycle_category(&cats, "Hobby", 1), Some("Clothing"));
    assert_eq!(cycle_category(&cats, "Clothing", -1), Some("Hobby"));
    assert_eq!(cycle_category(&cats, "Unknown", 1), Some("Clothing"));
    assert_eq!(cycle_category(&[], "Food", 1), None);
}
