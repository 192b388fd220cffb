//! Audit/history viewer use-case service.
//!
//! Read-only views: the cycle list with the revertible head flagged, and
//! the transition history newest first.

use crate::model::cycle::{CycleId, CycleSummary};
use crate::model::history::HistoryEntry;
use crate::repo::cycle_repo::CycleRepository;
use crate::repo::history_repo::{HistoryLedger, HistoryQuery};
use crate::repo::RepoResult;

pub struct AuditService<R: CycleRepository, H: HistoryLedger> {
    cycles: R,
    history: H,
}

impl<R: CycleRepository, H: HistoryLedger> AuditService<R, H> {
    pub fn new(cycles: R, history: H) -> Self {
        Self { cycles, history }
    }

    /// Cycles newest first; exactly one carries `is_head` when any exist.
    pub fn cycles(&self) -> RepoResult<Vec<CycleSummary>> {
        self.cycles.list_summaries()
    }

    /// History entries newest first, filtered by `query`.
    pub fn history(&self, query: &HistoryQuery) -> RepoResult<Vec<HistoryEntry>> {
        self.history.list(query)
    }

    /// Full history of one subject, newest first.
    pub fn subject_history(&self, subject_id: &str) -> RepoResult<Vec<HistoryEntry>> {
        self.history.list(&HistoryQuery {
            subject_id: Some(subject_id.to_string()),
            ..HistoryQuery::default()
        })
    }

    /// AUTO entries one closure wrote.
    pub fn cycle_entries(&self, cycle_id: CycleId) -> RepoResult<Vec<HistoryEntry>> {
        self.history.list_for_cycle(cycle_id)
    }
}
