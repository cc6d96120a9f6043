//! # fintrack Testkit
//!
//! Test utilities for fintrack.
//!
//! This crate provides:
//! - [`FakeBackend`], an in-process REST backend with fault injection
//! - [`TableHarness`], one table wired end to end against the fake
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fintrack_testkit::prelude::*;
//!
//! #[test]
//! fn create_is_replayed() {
//!     let harness = TableHarness::<Category>::memory();
//!     harness.recorder.create(Category::expense(1, "Rent")).unwrap();
//!     harness.reconciler.synchronize();
//!     assert!(harness.entity(1).unwrap().remote_id.is_some());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use fintrack_model::{Budget, Category, ChangeLogEntry, LogStatus, SavingsGoal, Transaction};
    pub use fintrack_store::ReplayOrder;
    pub use fintrack_sync_engine::{SyncState, TableReconciler};
}

pub use backend::*;
pub use fixtures::*;
pub use generators::*;
