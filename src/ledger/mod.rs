//! The ledger store: the ordered item list, its running total, and the
//! round-trip to local storage.
//!
//! State transitions are pure (`state::reduce`); this module owns the side
//! effects. Every committed transition rewrites the full snapshot.

mod export;
mod state;

use rust_decimal::{Decimal, RoundingStrategy};

pub(crate) use export::write_csv;
pub(crate) use state::{Confirmation, LedgerState};
use state::{reduce, Action, Step};

use crate::db::LocalStorage;
use crate::models::{cycle_category, Item, ItemId};

pub(crate) const UNAVAILABLE_WARNING: &str =
    "Local storage is unavailable. Changes will not be saved after you quit.";

pub(crate) struct Ledger {
    state: LedgerState,
    categories: Vec<String>,
    storage: Option<Box<dyn LocalStorage>>,
    storage_key: String,
    warning: Option<String>,
    storage_error: Option<String>,
}

impl Ledger {
    /// Load the persisted snapshot. `None` storage means the platform has no
    /// durable storage; the ledger then runs in memory only and carries a
    /// one-time warning.
    pub(crate) fn initialize(
        storage: Option<Box<dyn LocalStorage>>,
        storage_key: &str,
        categories: Vec<String>,
    ) -> Self {
        let mut warning = None;
        let items = match &storage {
            None => {
                warning = Some(UNAVAILABLE_WARNING.to_string());
                Vec::new()
            }
            Some(s) => match load_snapshot(s.as_ref(), storage_key) {
                Ok((items, 0)) => items,
                Ok((items, skipped)) => {
                    warning = Some(format!("{skipped} saved items could not be read and were dropped"));
                    items
                }
                Err(e) => {
                    tracing::warn!(key = storage_key, error = %format!("{e:#}"), "could not load ledger snapshot");
                    warning = Some(format!("Saved items could not be read: {e}"));
                    Vec::new()
                }
            },
        };
        tracing::info!(items = items.len(), persistent = storage.is_some(), "ledger initialized");

        Self {
            state: LedgerState::new(items, &categories),
            categories,
            storage,
            storage_key: storage_key.to_string(),
            warning,
            storage_error: None,
        }
    }

    pub(crate) fn items(&self) -> &[Item] {
        &self.state.items
    }

    pub(crate) fn state(&self) -> &LedgerState {
        &self.state
    }

    pub(crate) fn categories(&self) -> &[String] {
        &self.categories
    }

    pub(crate) fn is_persistent(&self) -> bool {
        self.storage.is_some()
    }

    /// The startup warning, handed out once.
    pub(crate) fn take_warning(&mut self) -> Option<String> {
        self.warning.take()
    }

    /// The most recent persistence failure, if any, including ones reported
    /// asynchronously by the storage backend.
    pub(crate) fn take_storage_error(&mut self) -> Option<String> {
        let deferred = self.storage.as_ref().and_then(|s| s.take_write_error());
        deferred.or_else(|| self.storage_error.take())
    }

    // ── Operations ────────────────────────────────────────────

    /// Add an item. Returns false (and changes nothing) when `raw_value` is
    /// not a number or `category` is not a configured category.
    pub(crate) fn add_item(&mut self, raw_value: &str, category: Option<&str>) -> bool {
        let mut id = ItemId::new_v4();
        while self.state.items.iter().any(|i| i.id == id) {
            id = ItemId::new_v4();
        }
        self.apply(Action::Add {
            raw: raw_value.to_string(),
            category: category.map(str::to_string),
            id,
            created_at: chrono::Utc::now().timestamp_millis(),
        })
    }

    /// Add an item from the pending input fields.
    pub(crate) fn submit_pending(&mut self) -> bool {
        let raw = self.state.new_item_value.clone();
        let category = self.state.new_item_category.clone();
        self.add_item(&raw, Some(&category))
    }

    pub(crate) fn remove_item(&mut self, id: &ItemId) -> bool {
        self.apply(Action::Remove(id.clone()))
    }

    pub(crate) fn reset(&mut self, confirmation: Confirmation) -> bool {
        self.apply(Action::Reset(confirmation))
    }

    pub(crate) fn set_new_item_value(&mut self, value: impl Into<String>) -> bool {
        self.apply(Action::SetValue(value.into()))
    }

    pub(crate) fn set_new_item_category(&mut self, name: &str) -> bool {
        self.apply(Action::SetCategory(name.to_string()))
    }

    pub(crate) fn cycle_category(&mut self, delta: i32) -> bool {
        match cycle_category(&self.categories, &self.state.new_item_category, delta) {
            Some(next) => {
                let next = next.to_string();
                self.set_new_item_category(&next)
            }
            None => false,
        }
    }

    pub(crate) fn total(&self) -> Decimal {
        state::total(&self.state.items)
    }

    fn apply(&mut self, action: Action) -> bool {
        match reduce(&self.state, action, &self.categories) {
            Step::Unchanged => false,
            Step::Pending(next) => {
                self.state = next;
                true
            }
            Step::Committed(next) => {
                self.state = next;
                self.persist();
                true
            }
        }
    }

    fn persist(&mut self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let result = serde_json::to_string(&self.state.items)
            .map_err(anyhow::Error::from)
            .and_then(|snapshot| storage.set_item(&self.storage_key, &snapshot));
        if let Err(e) = result {
            tracing::warn!(key = %self.storage_key, error = %format!("{e:#}"), "ledger snapshot not saved");
            self.storage_error = Some(format!("Could not save items: {e}"));
        }
    }
}

/// Read the snapshot item by item. Returns the readable items and how many
/// entries had to be skipped.
fn load_snapshot(storage: &dyn LocalStorage, key: &str) -> anyhow::Result<(Vec<Item>, usize)> {
    let Some(raw) = storage.get_item(key)? else {
        return Ok((Vec::new(), 0));
    };
    let entries: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
    let mut items = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Item>(entry) {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::warn!(key, index, error = %e, "skipping unreadable ledger item");
                skipped += 1;
            }
        }
    }
    Ok((items, skipped))
}

/// `$12.50` for non-negative amounts, `-$3.00` for negative ones.
pub(crate) fn format_currency(amount: Decimal) -> String {
    let magnitude = amount
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if amount < Decimal::ZERO && !magnitude.is_zero() {
        format!("-${magnitude:.2}")
    } else {
        format!("${magnitude:.2}")
    }
}
