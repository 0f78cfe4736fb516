use anyhow::{Context, Result};
use std::io::Write;

use crate::models::Item;

/// Write items as CSV (`id,created_at,category,value`), newest first.
/// Returns the number of rows written.
pub(crate) fn write_csv<W: Write>(items: &[Item], out: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["id", "created_at", "category", "value"])
        .context("Failed to write CSV header")?;
    for item in items {
        let created = item.created_label();
        let value = item.value.to_string();
        wtr.write_record([
            item.id.as_str(),
            created.as_str(),
            item.category.as_str(),
            value.as_str(),
        ])
        .with_context(|| format!("Failed to write item {}", item.id))?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(items.len())
}
