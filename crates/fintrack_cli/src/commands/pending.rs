//! Pending command implementation.

use super::{open_outbox, TABLES};
use fintrack_model::ChangeLogEntry;
use fintrack_store::{OutboxStore, ReplayOrder};
use std::path::Path;

/// Collects the outbox entries of every known table in replay order.
pub fn collect(dir: &Path) -> Result<Vec<ChangeLogEntry>, Box<dyn std::error::Error>> {
    let outbox = open_outbox(dir)?;
    let mut entries = Vec::new();
    for table in TABLES {
        entries.extend(outbox.list_pending(table, ReplayOrder::OldestFirst)?);
    }
    Ok(entries)
}

/// Runs the pending command.
pub fn run(dir: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let entries = collect(dir)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        "text" => {
            if entries.is_empty() {
                println!("Outbox is empty");
                return Ok(());
            }
            println!("{:>6}  {:<14} {:>10}  {:<10} Recorded", "Entry", "Table", "Record", "Status");
            for entry in &entries {
                println!(
                    "{:>6}  {:<14} {:>10}  {:<10} {}",
                    entry.id,
                    entry.table_name,
                    entry.record_id,
                    entry.status.as_str(),
                    entry.last_synced_timestamp
                );
            }
            println!();
            println!("{} pending", entries.len());
        }
        other => return Err(format!("Unknown format: {}", other).into()),
    }
    Ok(())
}
