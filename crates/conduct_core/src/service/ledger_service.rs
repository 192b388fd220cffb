//! Point ledger use-case service.
//!
//! # Responsibility
//! - Validate and record point events reported by the event surface.
//! - Emit one notification payload per recorded event.
//! - Delete events as corrections without touching closed cycles.
//!
//! # Invariants
//! - Validation happens before any write.
//! - Deleting an event inside a closed cycle's window never recomputes that
//!   cycle's stored `score_at_close`.

use crate::clock::{Clock, SystemClock};
use crate::model::point::{NewPointEvent, PointEvent, PointEventId};
use crate::model::validation::ValidationError;
use crate::repo::point_repo::PointLedger;
use crate::repo::RepoError;
use crate::score::ScoreWindow;
use crate::service::notification::{LogNotificationSink, Notification, NotificationSink};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from ledger use-cases.
#[derive(Debug)]
pub enum LedgerServiceError {
    Validation(ValidationError),
    SubjectNotFound(String),
    EventNotFound(String),
    Repo(RepoError),
}

impl Display for LedgerServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::SubjectNotFound(id) => write!(f, "subject not found: {id}"),
            Self::EventNotFound(id) => write!(f, "point event not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LedgerServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for LedgerServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for LedgerServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound {
                entity: "subject",
                id,
            } => Self::SubjectNotFound(id),
            RepoError::NotFound {
                entity: "point event",
                id,
            } => Self::EventNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Ledger service facade over a point ledger implementation.
pub struct LedgerService<L: PointLedger, C: Clock = SystemClock, N: NotificationSink = LogNotificationSink> {
    ledger: L,
    clock: C,
    notifier: N,
}

impl<L: PointLedger> LedgerService<L> {
    /// Creates a service stamping with the system clock and logging notifications.
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            clock: SystemClock,
            notifier: LogNotificationSink,
        }
    }
}

impl<L: PointLedger, C: Clock, N: NotificationSink> LedgerService<L, C, N> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> LedgerService<L, C2, N> {
        LedgerService {
            ledger: self.ledger,
            clock,
            notifier: self.notifier,
        }
    }

    pub fn with_notifier<N2: NotificationSink>(self, notifier: N2) -> LedgerService<L, C, N2> {
        LedgerService {
            ledger: self.ledger,
            clock: self.clock,
            notifier,
        }
    }

    /// Records one point event and emits its notification payload.
    pub fn append(&self, request: &NewPointEvent) -> Result<PointEvent, LedgerServiceError> {
        let request = request.validate()?;
        let event = self.ledger.append(&request, self.clock.now_ms())?;

        info!(
            "event=point_append module=ledger status=ok subject={} kind={} points={} created_at={}",
            event.subject_id,
            event.kind.as_str(),
            event.points,
            event.created_at
        );
        self.notifier.notify(&Notification {
            subject_id: event.subject_id.clone(),
            kind: event.kind.into(),
            description: event.description.clone(),
        });
        Ok(event)
    }

    /// Events of one subject within `window`, ascending by time.
    pub fn events(
        &self,
        subject_id: &str,
        window: ScoreWindow,
    ) -> Result<Vec<PointEvent>, LedgerServiceError> {
        Ok(self.ledger.query(subject_id, window)?)
    }

    /// Deletes one event as a correction.
    pub fn delete(&self, event_id: PointEventId) -> Result<PointEvent, LedgerServiceError> {
        let event = self.ledger.delete(event_id)?;
        let frozen = self
            .ledger
            .frozen_until()?
            .is_some_and(|boundary| event.created_at <= boundary);

        if frozen {
            warn!(
                "event=point_delete module=ledger status=ok subject={} event_id={} frozen_cycle=true",
                event.subject_id, event.id
            );
        } else {
            info!(
                "event=point_delete module=ledger status=ok subject={} event_id={} frozen_cycle=false",
                event.subject_id, event.id
            );
        }
        Ok(event)
    }
}
