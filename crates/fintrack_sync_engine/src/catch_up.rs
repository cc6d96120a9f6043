//! Remote id repair by name matching.
//!
//! A create acknowledged with an empty body leaves the local record without
//! a remote id. Catch-up lists the backend's records and assigns ids to such
//! records when the match is unambiguous.

use crate::engine::TableReconciler;
use crate::error::{SyncError, SyncResult};
use fintrack_model::{LogStatus, SyncEntity};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Result of one catch-up pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatchUpReport {
    /// Local ids that received a remote id.
    pub matched: Vec<u64>,
    /// Local ids whose name matched more than one candidate.
    pub ambiguous: Vec<u64>,
    /// Local ids with no remote record of the same name.
    pub unmatched: Vec<u64>,
}

impl CatchUpReport {
    /// Returns true if nothing needed repair.
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty() && self.ambiguous.is_empty() && self.unmatched.is_empty()
    }
}

impl<E: SyncEntity> TableReconciler<E> {
    /// Assigns remote ids to local records that have none.
    ///
    /// Candidates are local records without a remote id and without an
    /// outstanding PENDING entry. A candidate is matched when exactly one
    /// unclaimed remote record, and no other candidate, carries its name.
    /// Assigned ids are never overwritten. Holds the run guard, so it never
    /// overlaps a run of the same table.
    pub fn catch_up(&self) -> SyncResult<CatchUpReport> {
        let Some(_guard) = self.try_begin() else {
            return Err(SyncError::RunInProgress(E::TABLE.to_string()));
        };

        let locals = self.entities.list()?;
        let pending: HashSet<u64> = self
            .outbox
            .list_pending(E::TABLE, self.order)?
            .into_iter()
            .filter(|entry| entry.status == LogStatus::Pending)
            .map(|entry| entry.record_id)
            .collect();

        let claimed: BTreeSet<u64> = locals.iter().filter_map(|e| e.remote_id()).collect();
        let candidates: Vec<E> = locals
            .into_iter()
            .filter(|e| e.remote_id().is_none() && !pending.contains(&e.local_id()))
            .collect();

        let mut report = CatchUpReport::default();
        if candidates.is_empty() {
            return Ok(report);
        }

        let mut by_name: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        for record in self.remote.list()? {
            if let Some(id) = record.remote_id().filter(|id| !claimed.contains(id)) {
                by_name.entry(record.name().to_string()).or_default().push(id);
            }
        }

        let mut local_names: BTreeMap<&str, usize> = BTreeMap::new();
        for candidate in &candidates {
            *local_names.entry(candidate.name()).or_default() += 1;
        }

        let mut assignments = Vec::new();
        for candidate in &candidates {
            let local_id = candidate.local_id();
            match by_name.get(candidate.name()).map(Vec::as_slice) {
                None | Some([]) => report.unmatched.push(local_id),
                Some([remote_id]) if local_names[candidate.name()] == 1 => {
                    assignments.push((candidate.clone(), *remote_id));
                }
                Some(_) => report.ambiguous.push(local_id),
            }
        }

        for (mut entity, remote_id) in assignments {
            entity.assign_remote_id(remote_id)?;
            self.entities.put(&entity)?;
            tracing::info!(
                table = E::TABLE,
                local_id = entity.local_id(),
                remote_id,
                "remote id recovered by name"
            );
            report.matched.push(entity.local_id());
        }

        if !report.ambiguous.is_empty() {
            tracing::warn!(
                table = E::TABLE,
                ambiguous = report.ambiguous.len(),
                "catch-up left ambiguous records unassigned"
            );
        }
        Ok(report)
    }
}
