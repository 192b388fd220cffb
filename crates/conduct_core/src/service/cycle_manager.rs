//! Cycle closure, reversal and manual override orchestration.
//!
//! # Responsibility
//! - Close the open scoring window for every subject as one batch.
//! - Revert the head cycle, restoring every level it changed.
//! - Apply manual level overrides outside the transition table.
//!
//! # Invariants
//! - Each operation runs inside one `BEGIN IMMEDIATE` transaction; the
//!   database write lock is the cohort lock, so the head-cycle reads below
//!   are never stale.
//! - A failed batch leaves no cycle, history or level change behind.
//! - Only the head cycle can be reverted.
//! - Manual interventions are the only way out of `Level::Mau`.

use crate::clock::{Clock, SystemClock};
use crate::config::{EngineConfig, LockingConfig};
use crate::model::cycle::{Cycle, CycleId};
use crate::model::history::HistoryEntry;
use crate::model::level::{transition, Level};
use crate::model::subject::SubjectId;
use crate::model::validation::{require_text, ValidationError};
use crate::repo::cycle_repo::{CycleRepository, SqliteCycleRepository};
use crate::repo::history_repo::{HistoryLedger, SqliteHistoryLedger};
use crate::repo::point_repo::{PointLedger, SqlitePointLedger};
use crate::repo::subject_repo::{SqliteSubjectRepository, SubjectRepository};
use crate::repo::RepoError;
use crate::score::{compute_score, ScoreWindow};
use crate::service::notification::{
    LogNotificationSink, Notification, NotificationKind, NotificationSink,
};
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

/// Errors from cycle manager operations.
#[derive(Debug)]
pub enum CycleError {
    /// Input rejected before any write.
    Validation(ValidationError),
    /// Another cycle operation holds the cohort lock.
    Conflict { operation: &'static str },
    /// The cycle exists but a newer closure superseded it.
    LockedCycle {
        cycle_id: CycleId,
        head_cycle_id: CycleId,
    },
    CycleNotFound(CycleId),
    SubjectNotFound(SubjectId),
    /// A per-subject write failed; the whole batch was rolled back.
    SubjectWriteFailed {
        subject_id: SubjectId,
        source: RepoError,
    },
    Repo(RepoError),
}

impl Display for CycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Conflict { operation } => write!(
                f,
                "{operation} rejected: another cycle operation is in progress for this cohort"
            ),
            Self::LockedCycle {
                cycle_id,
                head_cycle_id,
            } => write!(
                f,
                "cycle {cycle_id} is locked: only the head cycle {head_cycle_id} can be reverted"
            ),
            Self::CycleNotFound(id) => write!(f, "cycle not found: {id}"),
            Self::SubjectNotFound(id) => write!(f, "subject not found: {id}"),
            Self::SubjectWriteFailed { subject_id, source } => write!(
                f,
                "batch aborted at subject {subject_id}: {source}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::SubjectWriteFailed { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for CycleError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for CycleError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound {
                entity: "subject",
                id,
            } => Self::SubjectNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for CycleError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Outcome of a successful closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleClosure {
    pub cycle: Cycle,
    /// One AUTO entry per subject, ordered by subject id.
    pub entries: Vec<HistoryEntry>,
}

impl CycleClosure {
    /// Number of subjects whose level changed.
    pub fn level_changes(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.is_level_change())
            .count()
    }
}

/// Outcome of a successful reversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReversal {
    pub cycle: Cycle,
    /// Subjects whose level was restored to `previous_level`.
    pub restored_subjects: usize,
}

/// Cohort-scoped cycle orchestrator over one SQLite connection.
pub struct CycleManager<'conn, C: Clock = SystemClock, N: NotificationSink = LogNotificationSink> {
    conn: &'conn Connection,
    baseline: i64,
    locking: LockingConfig,
    clock: C,
    notifier: N,
}

impl<'conn> CycleManager<'conn> {
    /// Creates a manager over a migrated connection.
    pub fn try_new(conn: &'conn Connection, config: &EngineConfig) -> Result<Self, CycleError> {
        SqliteSubjectRepository::try_new(conn)?;
        SqlitePointLedger::try_new(conn)?;
        SqliteCycleRepository::try_new(conn)?;
        SqliteHistoryLedger::try_new(conn)?;
        Ok(Self {
            conn,
            baseline: config.scoring.baseline,
            locking: config.locking.clone(),
            clock: SystemClock,
            notifier: LogNotificationSink,
        })
    }
}

impl<'conn, C: Clock, N: NotificationSink> CycleManager<'conn, C, N> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> CycleManager<'conn, C2, N> {
        CycleManager {
            conn: self.conn,
            baseline: self.baseline,
            locking: self.locking,
            clock,
            notifier: self.notifier,
        }
    }

    pub fn with_notifier<N2: NotificationSink>(self, notifier: N2) -> CycleManager<'conn, C, N2> {
        CycleManager {
            conn: self.conn,
            baseline: self.baseline,
            locking: self.locking,
            clock: self.clock,
            notifier,
        }
    }

    /// Closes the open window for every subject and commits level transitions.
    ///
    /// # Errors
    /// - `Validation` for a blank name or operator.
    /// - `Conflict` when another cycle operation holds the cohort lock.
    /// - `SubjectWriteFailed` naming the subject whose write failed; nothing
    ///   from the attempt remains.
    pub fn close_cycle(&self, name: &str, operator_id: &str) -> Result<CycleClosure, CycleError> {
        let name = require_text(name, ValidationError::EmptyCycleName)?;
        let operator_id = require_text(operator_id, ValidationError::EmptyActor("operator"))?;
        let started_at = Instant::now();
        info!("event=cycle_close module=cycle status=start");

        let tx = self.begin_batch("close_cycle")?;
        let closure = self.close_in(&tx, name, operator_id);
        let closure = closure.and_then(|closure| commit(tx, "close_cycle").map(|()| closure));

        match &closure {
            Ok(closure) => info!(
                "event=cycle_close module=cycle status=ok cycle_id={} closed_at={} subjects={} level_changes={} duration_ms={}",
                closure.cycle.id,
                closure.cycle.closed_at,
                closure.entries.len(),
                closure.level_changes(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_batch_error("cycle_close", err, started_at),
        }
        closure
    }

    /// Reverts the head cycle, restoring each subject's `previous_level`.
    ///
    /// # Errors
    /// - `CycleNotFound` when `cycle_id` does not exist.
    /// - `LockedCycle` when a newer cycle supersedes `cycle_id`.
    /// - `Conflict` when another cycle operation holds the cohort lock.
    pub fn revert_cycle(
        &self,
        cycle_id: CycleId,
        operator_id: &str,
    ) -> Result<CycleReversal, CycleError> {
        let operator_id = require_text(operator_id, ValidationError::EmptyActor("operator"))?;
        let started_at = Instant::now();
        info!(
            "event=cycle_revert module=cycle status=start cycle_id={} operator={}",
            cycle_id, operator_id
        );

        let tx = self.begin_batch("revert_cycle")?;
        let reversal = self.revert_in(&tx, cycle_id);
        let reversal = reversal.and_then(|reversal| commit(tx, "revert_cycle").map(|()| reversal));

        match &reversal {
            Ok(reversal) => info!(
                "event=cycle_revert module=cycle status=ok cycle_id={} restored={} duration_ms={}",
                reversal.cycle.id,
                reversal.restored_subjects,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_batch_error("cycle_revert", err, started_at),
        }
        reversal
    }

    /// Sets a subject's level directly, bypassing the transition table.
    ///
    /// # Errors
    /// - `Validation` for a blank justification or operator.
    /// - `SubjectNotFound` when the subject is not on the roster.
    /// - `Conflict` when another cycle operation holds the cohort lock.
    pub fn manual_intervention(
        &self,
        subject_id: &str,
        new_level: Level,
        justification: &str,
        operator_id: &str,
    ) -> Result<HistoryEntry, CycleError> {
        let justification = require_text(justification, ValidationError::EmptyJustification)?;
        let operator_id = require_text(operator_id, ValidationError::EmptyActor("operator"))?;

        let tx = self.begin_batch("manual_intervention")?;
        let entry = self.intervene_in(&tx, subject_id, new_level, justification, operator_id);
        let entry = entry.and_then(|entry| commit(tx, "manual_intervention").map(|()| entry));

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(
                    "event=manual_intervention module=cycle status=error subject={} error={}",
                    subject_id, err
                );
                return Err(err);
            }
        };

        info!(
            "event=manual_intervention module=cycle status=ok subject={} previous={} new={}",
            entry.subject_id, entry.previous_level, entry.new_level
        );
        self.notifier.notify(&Notification {
            subject_id: entry.subject_id.clone(),
            kind: NotificationKind::LevelChange,
            description: format!(
                "{} -> {}: {}",
                entry.previous_level, entry.new_level, entry.justification
            ),
        });
        Ok(entry)
    }

    fn close_in(
        &self,
        conn: &Connection,
        name: String,
        operator_id: String,
    ) -> Result<CycleClosure, CycleError> {
        let subjects = SqliteSubjectRepository::try_new(conn)?;
        let ledger = SqlitePointLedger::try_new(conn)?;
        let cycles = SqliteCycleRepository::try_new(conn)?;
        let history = SqliteHistoryLedger::try_new(conn)?;

        let head_closed_at = cycles.head()?.map(|head| head.closed_at);
        let closed_at = after_head(self.clock.now_ms(), head_closed_at);
        let cycle = Cycle {
            id: Uuid::new_v4(),
            name,
            closed_at,
            closed_by: operator_id,
        };
        cycles.insert(&cycle)?;

        let window = ScoreWindow {
            after: head_closed_at,
            until: Some(closed_at),
        };
        let mut events = ledger.query_all(window)?;
        let roster = subjects.list()?;
        let mut entries = Vec::with_capacity(roster.len());

        for subject in roster {
            let subject_events = events.remove(&subject.id).unwrap_or_default();
            let score = compute_score(&subject_events, self.baseline);
            let next_level = transition(subject.current_level, score);
            let entry = HistoryEntry::auto(
                subject.id.as_str(),
                &cycle,
                subject.current_level,
                next_level,
                score,
            );

            history
                .append(&entry)
                .and_then(|()| subjects.set_level(&subject.id, next_level))
                .map_err(|source| CycleError::SubjectWriteFailed {
                    subject_id: subject.id.clone(),
                    source,
                })?;
            entries.push(entry);
        }

        Ok(CycleClosure { cycle, entries })
    }

    fn revert_in(&self, conn: &Connection, cycle_id: CycleId) -> Result<CycleReversal, CycleError> {
        let subjects = SqliteSubjectRepository::try_new(conn)?;
        let cycles = SqliteCycleRepository::try_new(conn)?;
        let history = SqliteHistoryLedger::try_new(conn)?;

        let cycle = cycles
            .get(cycle_id)?
            .ok_or(CycleError::CycleNotFound(cycle_id))?;
        let head = cycles.head()?.ok_or(CycleError::CycleNotFound(cycle_id))?;
        if head.id != cycle.id {
            return Err(CycleError::LockedCycle {
                cycle_id,
                head_cycle_id: head.id,
            });
        }

        let entries = history.list_for_cycle(cycle_id)?;
        for entry in &entries {
            let current = subjects
                .get(&entry.subject_id)?
                .map(|subject| subject.current_level);
            if current != Some(entry.new_level) {
                warn!(
                    "event=cycle_revert module=cycle status=overwrite cycle_id={} subject={} current={} restored={}",
                    cycle_id,
                    entry.subject_id,
                    current.map_or("missing", Level::as_str),
                    entry.previous_level
                );
            }
            subjects
                .set_level(&entry.subject_id, entry.previous_level)
                .map_err(|source| CycleError::SubjectWriteFailed {
                    subject_id: entry.subject_id.clone(),
                    source,
                })?;
        }

        history.delete_auto_for_cycle(cycle_id)?;
        cycles.delete(cycle_id)?;

        Ok(CycleReversal {
            cycle,
            restored_subjects: entries.len(),
        })
    }

    fn intervene_in(
        &self,
        conn: &Connection,
        subject_id: &str,
        new_level: Level,
        justification: String,
        operator_id: String,
    ) -> Result<HistoryEntry, CycleError> {
        let subjects = SqliteSubjectRepository::try_new(conn)?;
        let cycles = SqliteCycleRepository::try_new(conn)?;
        let history = SqliteHistoryLedger::try_new(conn)?;

        let subject = subjects
            .get(subject_id)?
            .ok_or_else(|| CycleError::SubjectNotFound(subject_id.to_string()))?;
        let head_closed_at = cycles.head()?.map(|head| head.closed_at);
        let entry = HistoryEntry::manual(
            subject.id.as_str(),
            subject.current_level,
            new_level,
            justification,
            operator_id,
            after_head(self.clock.now_ms(), head_closed_at),
        );
        history.append(&entry)?;
        subjects.set_level(&subject.id, new_level)?;
        Ok(entry)
    }

    /// Takes the cohort lock, waiting at most `lock_wait_ms` for it.
    fn begin_batch(&self, operation: &'static str) -> Result<Transaction<'conn>, CycleError> {
        self.conn.busy_timeout(self.locking.lock_wait())?;
        let begun = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate);
        let restored = self.conn.busy_timeout(self.locking.busy_timeout());

        let tx = match begun {
            Ok(tx) => tx,
            Err(err) => {
                let err = RepoError::from(err);
                if err.is_busy() {
                    warn!(
                        "event=cohort_lock module=cycle status=conflict operation={}",
                        operation
                    );
                    return Err(CycleError::Conflict { operation });
                }
                return Err(err.into());
            }
        };
        restored?;
        Ok(tx)
    }
}

/// Clock reading pushed past the head boundary so history stays ordered.
fn after_head(now_ms: i64, head_closed_at: Option<i64>) -> i64 {
    head_closed_at.map_or(now_ms, |boundary| now_ms.max(boundary.saturating_add(1)))
}

fn commit(tx: Transaction<'_>, operation: &'static str) -> Result<(), CycleError> {
    tx.commit().map_err(|err| {
        let err = RepoError::from(err);
        if err.is_busy() {
            CycleError::Conflict { operation }
        } else {
            err.into()
        }
    })
}

fn log_batch_error(event: &str, err: &CycleError, started_at: Instant) {
    match err {
        CycleError::SubjectWriteFailed { subject_id, source } => error!(
            "event={} module=cycle status=error error_code=subject_write_failed subject={} duration_ms={} error={}",
            event,
            subject_id,
            started_at.elapsed().as_millis(),
            source
        ),
        other => warn!(
            "event={} module=cycle status=error duration_ms={} error={}",
            event,
            started_at.elapsed().as_millis(),
            other
        ),
    }
}
