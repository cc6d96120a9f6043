//! Sync and catch-up command implementations.

use super::{open_coordinator, RemoteOptions};
use fintrack_sync_engine::{RunReport, SyncState, Trigger};
use std::path::Path;

/// Runs the sync command.
pub fn run(
    dir: &Path,
    remote: &RemoteOptions,
    table: Option<&str>,
    newest_first: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = remote.config(newest_first);
    let coordinator = open_coordinator(dir, &config)?;

    println!("Reconciling {:?} against {}", dir, config.base_url());
    if newest_first {
        tracing::warn!("newest-first replay can drop updates queued after a create");
        println!("Replaying newest entries first; updates queued after a create may be dropped");
    }
    println!();

    let triggers = match table {
        Some(table) => vec![coordinator.synchronize(table)?],
        None => coordinator.synchronize_all()?,
    };

    let mut failed = 0;
    for trigger in triggers {
        match trigger {
            Trigger::Started(handle) => {
                let report = handle.join()?;
                print_report(&report);
                if report.state == SyncState::Error {
                    tracing::warn!(
                        table = %report.table,
                        remaining = report.remaining,
                        error = report.error.as_deref().unwrap_or_default(),
                        "table failed to reconcile"
                    );
                    failed += 1;
                } else {
                    tracing::info!(
                        table = %report.table,
                        state = %report.state,
                        synced = report.synced,
                        discarded = report.discarded,
                        "table reconciled"
                    );
                }
            }
            Trigger::AlreadyRunning => {
                tracing::debug!("run already in progress, skipped");
                println!("Skipped: a run is already in progress");
            }
        }
    }

    println!();
    if failed == 0 {
        println!("✓ Reconciliation finished");
        Ok(())
    } else {
        println!("✗ Reconciliation failed for {} table(s); run sync again to retry", failed);
        Err("Reconciliation failed".into())
    }
}

/// Runs the catch-up command.
pub fn catch_up(
    dir: &Path,
    remote: &RemoteOptions,
    table: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = open_coordinator(dir, &remote.config(false))?;
    let tables = match table {
        Some(table) => vec![table.to_string()],
        None => coordinator.tables(),
    };

    for table in tables {
        let report = coordinator.catch_up(&table)?;
        tracing::info!(
            table = %table,
            matched = report.matched.len(),
            ambiguous = report.ambiguous.len(),
            unmatched = report.unmatched.len(),
            "catch-up finished"
        );
        if report.is_empty() {
            println!("{}: nothing to repair", table);
            continue;
        }
        println!(
            "{}: {} matched, {} ambiguous, {} unmatched",
            table,
            report.matched.len(),
            report.ambiguous.len(),
            report.unmatched.len()
        );
        for local_id in &report.ambiguous {
            tracing::warn!(table = %table, local_id, "ambiguous catch-up match");
            println!("  record {} has more than one candidate; rename it to disambiguate", local_id);
        }
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("{}: {}", report.table, report.state);
    if report.synced > 0 || report.discarded > 0 {
        println!("  Synced:     {}", report.synced);
        println!("  Discarded:  {}", report.discarded);
    }
    if let Some(error) = &report.error {
        println!("  Remaining:  {}", report.remaining);
        println!("  Error:      {}", error);
    }
    println!("  Duration:   {:?}", report.duration);
}
