/// Categories offered when no configuration overrides them.
pub const DEFAULT_CATEGORIES: &[&str] = &["Clothing", "Food", "Fuel", "Grooming", "Health", "Hobby"];

/// Find a configured category by name (case-insensitive), returning the
/// configured spelling.
pub fn find_category<'a>(categories: &'a [String], name: &str) -> Option<&'a str> {
    let lower = name.trim().to_lowercase();
    categories
        .iter()
        .find(|c| c.to_lowercase() == lower)
        .map(String::as_str)
}

/// Step through the configured categories from `current`, wrapping at both
/// ends. An unknown `current` starts from the first category.
pub fn cycle_category<'a>(categories: &'a [String], current: &str, delta: i32) -> Option<&'a str> {
    if categories.is_empty() {
        return None;
    }
    let len = categories.len() as i32;
    let idx = categories
        .iter()
        .position(|c| c == current)
        .map_or(0, |i| (i as i32 + delta).rem_euclid(len));
    categories.get(idx as usize).map(String::as_str)
}
