mod category;
mod item;

pub use category::{cycle_category, find_category, DEFAULT_CATEGORIES};
pub use item::{Item, ItemId};

#[cfg(test)]
mod tests;
