//! # fintrack Store
//!
//! Store contracts consumed by the reconciliation engine, with reference
//! implementations.
//!
//! ## Design Principles
//!
//! - Stores are plain CRUD containers with interior locking
//! - Stores know nothing about the backend or sync phases
//! - Must be `Send + Sync` so a background worker can own a handle
//! - The outbox is append-only; entries are removed, never edited
//!
//! ## Available Implementations
//!
//! - [`MemoryEntityStore`] / [`MemoryOutbox`] - For tests and ephemeral use
//! - [`FileEntityStore`] / [`FileOutbox`] - JSON files in a data directory
//!
//! ## Example
//!
//! ```rust
//! use fintrack_model::Category;
//! use fintrack_store::{ChangeRecorder, MemoryEntityStore, MemoryOutbox, OutboxStore, ReplayOrder};
//! use std::sync::Arc;
//!
//! let outbox = Arc::new(MemoryOutbox::new());
//! let recorder = ChangeRecorder::<Category>::new(Arc::new(MemoryEntityStore::<Category>::new()), outbox.clone());
//! recorder.create(Category::expense(1, "Groceries")).unwrap();
//!
//! let pending = outbox.list_pending("categories", ReplayOrder::OldestFirst).unwrap();
//! assert_eq!(pending.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity_store;
mod error;
mod file;
mod memory;
mod outbox;
mod recorder;

pub use entity_store::EntityStore;
pub use error::{StoreError, StoreResult};
pub use file::{FileEntityStore, FileOutbox};
pub use memory::{MemoryEntityStore, MemoryOutbox};
pub use outbox::{OutboxStore, ReplayOrder};
pub use recorder::ChangeRecorder;
