use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::{find_category, Item, ItemId};

/// Answer to the "reset everything?" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Confirmation {
    Confirmed,
    Cancelled,
}

/// Snapshot of the ledger plus the pending input form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LedgerState {
    pub(crate) items: Vec<Item>,
    pub(crate) new_item_value: String,
    pub(crate) new_item_category: String,
}

impl LedgerState {
    pub(crate) fn new(items: Vec<Item>, categories: &[String]) -> Self {
        Self {
            items,
            new_item_value: String::new(),
            new_item_category: first_category(categories),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Action {
    SetValue(String),
    SetCategory(String),
    Add {
        raw: String,
        category: Option<String>,
        id: ItemId,
        created_at: i64,
    },
    Remove(ItemId),
    Reset(Confirmation),
}

/// Result of applying an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Nothing changed.
    Unchanged,
    /// Only the pending input changed; nothing to persist.
    Pending(LedgerState),
    /// The item sequence changed and must be persisted.
    Committed(LedgerState),
}

pub(crate) fn reduce(state: &LedgerState, action: Action, categories: &[String]) -> Step {
    match action {
        Action::SetValue(value) => {
            if value == state.new_item_value {
                return Step::Unchanged;
            }
            Step::Pending(LedgerState {
                new_item_value: value,
                ..state.clone()
            })
        }
        Action::SetCategory(name) => match find_category(categories, &name) {
            Some(cat) if cat != state.new_item_category => Step::Pending(LedgerState {
                new_item_category: cat.to_string(),
                ..state.clone()
            }),
            _ => Step::Unchanged,
        },
        Action::Add {
            raw,
            category,
            id,
            created_at,
        } => {
            let Some(value) = parse_value(&raw) else {
                return Step::Unchanged;
            };
            if total(&state.items).checked_add(value).is_none() {
                return Step::Unchanged;
            }
            let category = match category {
                None => first_category(categories),
                Some(name) => match find_category(categories, &name) {
                    Some(cat) => cat.to_string(),
                    None => return Step::Unchanged,
                },
            };
            if state.items.iter().any(|i| i.id == id) {
                return Step::Unchanged;
            }

            let mut items = Vec::with_capacity(state.items.len() + 1);
            items.push(Item::new(id, value, category, created_at));
            items.extend(state.items.iter().cloned());
            Step::Committed(LedgerState::new(items, categories))
        }
        Action::Remove(id) => {
            let Some(pos) = state.items.iter().position(|i| i.id == id) else {
                return Step::Unchanged;
            };
            let items = state
                .items
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != pos)
                .map(|(_, item)| item.clone())
                .collect();
            Step::Committed(LedgerState {
                items,
                ..state.clone()
            })
        }
        Action::Reset(Confirmation::Cancelled) => Step::Unchanged,
        Action::Reset(Confirmation::Confirmed) => Step::Committed(LedgerState {
            items: Vec::new(),
            new_item_value: String::new(),
            new_item_category: state.new_item_category.clone(),
        }),
    }
}

/// Parse user input as a signed decimal. Accepts plain (`-10.50`) and
/// scientific (`1e3`) notation; surrounding whitespace is ignored.
///
/// Snapshots store values as JSON floats, so a value is only accepted if it
/// reads back unchanged from its `f64` form.
pub(crate) fn parse_value(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let value = Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()?;
    survives_float(value).then_some(value)
}

fn survives_float(value: Decimal) -> bool {
    let Some(f) = value.to_f64().filter(|f| f.is_finite()) else {
        return false;
    };
    Decimal::from_str(&f.to_string()).is_ok_and(|back| back == value)
}

/// Signed sum of all values. Saturates at the `Decimal` bounds instead of
/// overflowing.
pub(crate) fn total(items: &[Item]) -> Decimal {
    items
        .iter()
        .fold(Decimal::ZERO, |acc, i| acc.saturating_add(i.value))
}

fn first_category(categories: &[String]) -> String {
    categories.first().cloned().unwrap_or_default()
}
