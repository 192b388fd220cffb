//! Score query use-case service.
//!
//! # Responsibility
//! - Resolve the scoring window of a subject for the open period or any
//!   closed cycle, and fold it into a score.
//! - Preview what a closure would do right now, without writing anything.
//!
//! # Invariants
//! - Reads only; results are a point-in-time snapshot.

use crate::model::cycle::{CycleId, CycleRef};
use crate::model::level::{transition, Level};
use crate::model::subject::Subject;
use crate::repo::cycle_repo::CycleRepository;
use crate::repo::point_repo::PointLedger;
use crate::repo::subject_repo::SubjectRepository;
use crate::repo::RepoError;
use crate::score::{compute_score, window_for, Score, ScoreWindow};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from score queries.
#[derive(Debug)]
pub enum ScoreServiceError {
    SubjectNotFound(String),
    CycleNotFound(CycleId),
    Repo(RepoError),
}

impl Display for ScoreServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SubjectNotFound(id) => write!(f, "subject not found: {id}"),
            Self::CycleNotFound(id) => write!(f, "cycle not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ScoreServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ScoreServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Open-window standing of one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectStanding {
    pub subject: Subject,
    pub open_score: Score,
    /// Level the subject would move to if the cycle closed now.
    pub projected_level: Level,
}

/// Score service facade over ledger, cycle and subject repositories.
pub struct ScoreService<L: PointLedger, R: CycleRepository, S: SubjectRepository> {
    ledger: L,
    cycles: R,
    subjects: S,
    baseline: i64,
}

impl<L: PointLedger, R: CycleRepository, S: SubjectRepository> ScoreService<L, R, S> {
    pub fn new(ledger: L, cycles: R, subjects: S, baseline: i64) -> Self {
        Self {
            ledger,
            cycles,
            subjects,
            baseline,
        }
    }

    /// Computes the score of `subject_id` over the window `cycle_ref` names.
    pub fn compute_score(
        &self,
        subject_id: &str,
        cycle_ref: CycleRef,
    ) -> Result<Score, ScoreServiceError> {
        if self.subjects.get(subject_id)?.is_none() {
            return Err(ScoreServiceError::SubjectNotFound(subject_id.to_string()));
        }
        let window = self.resolve_window(cycle_ref)?;
        let events = self.ledger.query(subject_id, window)?;
        Ok(compute_score(&events, self.baseline))
    }

    /// Resolves the time bounds `cycle_ref` stands for.
    pub fn resolve_window(&self, cycle_ref: CycleRef) -> Result<ScoreWindow, ScoreServiceError> {
        match cycle_ref {
            CycleRef::Open => Ok(ScoreWindow::open_after(
                self.cycles.head()?.map(|head| head.closed_at),
            )),
            CycleRef::Closed(cycle_id) => {
                let cycles = self.cycles.list_desc()?;
                window_for(&cycles, cycle_ref).ok_or(ScoreServiceError::CycleNotFound(cycle_id))
            }
        }
    }

    /// Open-window score and projected level of every subject.
    pub fn score_all_open(&self) -> Result<Vec<SubjectStanding>, ScoreServiceError> {
        let window = self.resolve_window(CycleRef::Open)?;
        let mut events = self.ledger.query_all(window)?;
        let standings = self
            .subjects
            .list()?
            .into_iter()
            .map(|subject| {
                let subject_events = events.remove(&subject.id).unwrap_or_default();
                let open_score = compute_score(&subject_events, self.baseline);
                let projected_level = transition(subject.current_level, open_score);
                SubjectStanding {
                    subject,
                    open_score,
                    projected_level,
                }
            })
            .collect();
        Ok(standings)
    }
}
