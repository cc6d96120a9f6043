//! # fintrack Sync Engine
//!
//! Outbox reconciliation for fintrack.
//!
//! This crate provides:
//! - Per-table reconciliation of the local outbox against a REST backend
//! - A last-value-wins status channel per table
//! - A coordinator that runs tables on background workers
//! - Remote id repair by name matching (catch-up)
//! - HTTP client abstraction with an optional `reqwest` implementation
//!
//! ## Architecture
//!
//! Local mutations never touch the network. They are written to the entity
//! store and recorded in the outbox. A run replays the outbox of one table:
//! 1. Read the pending entries in replay order
//! 2. Replay each entry as a create, update or delete
//! 3. Remove the entry once the backend has acknowledged it
//!
//! ## Key Invariants
//!
//! - At most one run per table at a time
//! - Entries are removed only after the backend acknowledged them
//! - The first unrecoverable failure stops the run; later entries stay queued
//! - Stale entries are discarded without a remote call
//! - An assigned remote id is never replaced

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catch_up;
mod config;
mod coordinator;
mod engine;
mod error;
mod http;
mod remote;
mod status;

pub use catch_up::CatchUpReport;
pub use config::SyncConfig;
pub use coordinator::{RunHandle, SyncCoordinator, Trigger};
pub use engine::{Reconcile, RunGuard, RunOutcome, RunReport, SyncStats, TableReconciler};
pub use error::{StaleReason, SyncError, SyncResult};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use http::{HttpClient, HttpRequest, HttpResponse, Method, RestEntityClient};
pub use remote::{CreateOutcome, MockRemote, RemoteCall, RemoteEntityClient};
pub use status::{StatusPublisher, SyncState};
