//! # fintrack Model
//!
//! Change-log and entity types shared by the fintrack stores and the
//! reconciliation engine.
//!
//! This crate provides:
//! - [`ChangeLogEntry`] and [`LogStatus`] for outbox records
//! - The [`SyncEntity`] trait implemented by every reconciled record kind
//! - The four finance record kinds: [`Category`], [`Transaction`],
//!   [`Budget`] and [`SavingsGoal`]
//! - [`RemoteRecord`], the minimal shape of a server acknowledgement
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_log;
mod entity;
mod error;
mod kinds;

pub use change_log::{now_millis, ChangeLogEntry, LogStatus};
pub use entity::{RemoteRecord, SyncEntity};
pub use error::{ModelError, ModelResult};
pub use kinds::{Budget, BudgetPeriod, Category, CategoryKind, SavingsGoal, Transaction};
