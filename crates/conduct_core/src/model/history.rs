//! Level transition history model.
//!
//! # Invariants
//! - AUTO entries always reference a cycle and carry `score_at_close`.
//! - MANUAL entries never reference a cycle and carry no score.
//! - Entries are never edited; AUTO entries disappear only with their cycle.

use crate::model::cycle::{Cycle, CycleId};
use crate::model::level::Level;
use crate::model::subject::SubjectId;
use crate::model::validation::ValidationError;
use crate::score::Score;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of one history entry.
pub type HistoryEntryId = Uuid;

/// Period label written on manual interventions.
pub const MANUAL_PERIOD_LABEL: &str = "manual";

/// How a level transition came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionType {
    /// Produced by a cycle closure through the transition table.
    Auto,
    /// Operator override, bypassing the transition table.
    Manual,
}

impl TransitionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Manual => "MANUAL",
        }
    }
}

impl Display for TransitionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "AUTO" => Ok(Self::Auto),
            "MANUAL" => Ok(Self::Manual),
            other => Err(ValidationError::UnknownTransitionType(other.to_string())),
        }
    }
}

/// Immutable level transition record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub subject_id: SubjectId,
    pub cycle_id: Option<CycleId>,
    pub previous_level: Level,
    pub new_level: Level,
    pub score_at_close: Option<Score>,
    pub transition_type: TransitionType,
    pub justification: String,
    pub period: String,
    pub operator_id: String,
    /// Unix epoch milliseconds. Equals the cycle's `closed_at` for AUTO entries.
    pub recorded_at: i64,
}

impl HistoryEntry {
    /// Builds the AUTO entry a closure of `cycle` writes for one subject.
    pub fn auto(
        subject_id: impl Into<SubjectId>,
        cycle: &Cycle,
        previous_level: Level,
        new_level: Level,
        score: Score,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            cycle_id: Some(cycle.id),
            previous_level,
            new_level,
            score_at_close: Some(score),
            transition_type: TransitionType::Auto,
            justification: format!("closure of `{}` with score {score}", cycle.name),
            period: cycle.name.clone(),
            operator_id: cycle.closed_by.clone(),
            recorded_at: cycle.closed_at,
        }
    }

    /// Builds a MANUAL entry for an operator override.
    pub fn manual(
        subject_id: impl Into<SubjectId>,
        previous_level: Level,
        new_level: Level,
        justification: impl Into<String>,
        operator_id: impl Into<String>,
        recorded_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            cycle_id: None,
            previous_level,
            new_level,
            score_at_close: None,
            transition_type: TransitionType::Manual,
            justification: justification.into(),
            period: MANUAL_PERIOD_LABEL.to_string(),
            operator_id: operator_id.into(),
            recorded_at,
        }
    }

    /// Returns whether the entry changed the subject's level.
    pub fn is_level_change(&self) -> bool {
        self.previous_level != self.new_level
    }
}
