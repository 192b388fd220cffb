//! Core domain logic for the conduct engine.
//! This crate is the single source of truth for scoring and level invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod score;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig, LockingConfig, LoggingConfig, ScoringConfig};
pub use db::{open_db, open_db_in_memory, open_db_with, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::cycle::{Cycle, CycleId, CycleRef, CycleSummary};
pub use model::history::{HistoryEntry, HistoryEntryId, TransitionType, MANUAL_PERIOD_LABEL};
pub use model::level::{transition, Level};
pub use model::point::{NewPointEvent, PointEvent, PointEventId, PointKind};
pub use model::subject::{Subject, SubjectId};
pub use model::validation::ValidationError;
pub use repo::cycle_repo::{CycleRepository, SqliteCycleRepository};
pub use repo::history_repo::{HistoryLedger, HistoryQuery, SqliteHistoryLedger};
pub use repo::point_repo::{PointLedger, SqlitePointLedger};
pub use repo::subject_repo::{SqliteSubjectRepository, SubjectRepository};
pub use repo::{RepoError, RepoResult};
pub use score::{compute_score, score_trace, Score, ScoreWindow, DEFAULT_BASELINE};
pub use service::audit_service::AuditService;
pub use service::cycle_manager::{CycleClosure, CycleError, CycleManager, CycleReversal};
pub use service::ledger_service::{LedgerService, LedgerServiceError};
pub use service::notification::{
    LogNotificationSink, MemoryNotificationSink, Notification, NotificationKind, NotificationSink,
};
pub use service::score_service::{ScoreService, ScoreServiceError, SubjectStanding};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
