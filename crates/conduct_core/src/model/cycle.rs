//! Cycle (closure checkpoint) model.
//!
//! # Invariants
//! - Cycles are totally ordered by `closed_at`; the latest one is the head.
//! - A cycle exists only because a closure created it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one closed cycle.
pub type CycleId = Uuid;

/// Persisted closure checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub id: CycleId,
    pub name: String,
    /// Unix epoch milliseconds; inclusive upper bound of this cycle's window.
    pub closed_at: i64,
    pub closed_by: String,
}

/// Cycle as shown to the audit viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    #[serde(flatten)]
    pub cycle: Cycle,
    /// Only the head cycle may be reverted.
    pub is_head: bool,
    /// Number of AUTO history entries written by this closure.
    pub subject_count: u32,
}

/// Selects which scoring window a score query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "window", content = "cycle_id", rename_all = "snake_case")]
pub enum CycleRef {
    /// Events recorded after the head cycle closed.
    Open,
    /// Events folded into one closed cycle.
    Closed(CycleId),
}
