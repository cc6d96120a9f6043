//! Offline category edits.

use super::open_outbox;
use fintrack_model::{Category, CategoryKind};
use fintrack_store::{ChangeRecorder, EntityStore, FileEntityStore, StoreError};
use std::path::Path;
use std::sync::Arc;

fn recorder(dir: &Path) -> Result<ChangeRecorder<Category>, StoreError> {
    let entities = Arc::new(FileEntityStore::<Category>::open(dir)?);
    Ok(ChangeRecorder::<Category>::new(entities, open_outbox(dir)?))
}

/// Creates a category and queues it for upload.
pub fn add(dir: &Path, name: &str, income: bool) -> Result<(), Box<dyn std::error::Error>> {
    let recorder = recorder(dir)?;
    let local_id = recorder.entities().next_local_id()?;
    let kind = if income {
        CategoryKind::Income
    } else {
        CategoryKind::Expense
    };

    let entry = recorder.create(Category::new(local_id, name, kind))?;
    println!("Added category {} ({:?}), outbox entry {}", local_id, name, entry.id);
    Ok(())
}

/// Renames a category and queues the update.
pub fn rename(dir: &Path, local_id: u64, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let recorder = recorder(dir)?;
    let mut category = recorder
        .entities()
        .get(local_id)?
        .ok_or_else(|| format!("No category with id {}", local_id))?;
    category.name = name.to_string();

    let entry = recorder.update(&category)?;
    println!("Renamed category {} to {:?}, outbox entry {}", local_id, name, entry.id);
    Ok(())
}

/// Removes a category and queues the delete if the backend knows it.
pub fn remove(dir: &Path, local_id: u64) -> Result<(), Box<dyn std::error::Error>> {
    let recorder = recorder(dir)?;
    match recorder.delete(local_id)? {
        Some(entry) => println!(
            "Removed category {}, outbox entry {} deletes remote record {}",
            local_id, entry.id, entry.record_id
        ),
        None => println!("Removed category {} (never synced)", local_id),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fintrack_model::LogStatus;
    use fintrack_store::{FileOutbox, OutboxStore, ReplayOrder};

    fn pending(dir: &Path) -> Vec<LogStatus> {
        FileOutbox::open(dir)
            .unwrap()
            .list_pending("categories", ReplayOrder::OldestFirst)
            .unwrap()
            .into_iter()
            .map(|e| e.status)
            .collect()
    }

    #[test]
    fn edits_are_queued() {
        let dir = tempfile::tempdir().unwrap();
        add(dir.path(), "Rent", false).unwrap();
        add(dir.path(), "Salary", true).unwrap();
        rename(dir.path(), 1, "Housing").unwrap();

        let store = FileEntityStore::<Category>::open(dir.path()).unwrap();
        assert_eq!(store.get(1).unwrap().unwrap().name, "Housing");
        assert_eq!(store.get(2).unwrap().unwrap().kind, CategoryKind::Income);
        assert_eq!(
            pending(dir.path()),
            vec![LogStatus::Pending, LogStatus::Pending, LogStatus::Updated]
        );
    }

    #[test]
    fn removing_unsynced_category_queues_nothing() {
        let dir = tempfile::tempdir().unwrap();
        add(dir.path(), "Rent", false).unwrap();
        remove(dir.path(), 1).unwrap();

        assert_eq!(pending(dir.path()), vec![LogStatus::Pending]);
        assert!(rename(dir.path(), 1, "x").is_err());
    }
}
