//! Input validation errors shared across the engine.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rejection raised before any write happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Point value must be strictly positive.
    NonPositivePoints(i64),
    /// Point kind text is neither `merit` nor `demerit`.
    UnknownPointKind(String),
    /// Level text is not one of the six recognized states.
    UnknownLevel(String),
    /// Transition type text is neither `AUTO` nor `MANUAL`.
    UnknownTransitionType(String),
    /// Manual interventions require a non-blank justification.
    EmptyJustification,
    /// Cycle name is blank after trim.
    EmptyCycleName,
    /// Operator or recorder identity is blank after trim.
    EmptyActor(&'static str),
    /// Subject identity is blank after trim.
    EmptySubjectId,
    /// Explicit event timestamp falls inside an already closed cycle.
    BackdatedIntoClosedCycle { created_at: i64, frozen_until: i64 },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositivePoints(points) => {
                write!(f, "points must be greater than zero, got {points}")
            }
            Self::UnknownPointKind(value) => {
                write!(f, "unknown point kind `{value}`; expected merit|demerit")
            }
            Self::UnknownLevel(value) => write!(
                f,
                "unknown level `{value}`; expected EXCEPCIONAL|OTIMO|BOM|REGULAR|INSUFICIENTE|MAU"
            ),
            Self::UnknownTransitionType(value) => {
                write!(f, "unknown transition type `{value}`; expected AUTO|MANUAL")
            }
            Self::EmptyJustification => write!(f, "justification must not be blank"),
            Self::EmptyCycleName => write!(f, "cycle name must not be blank"),
            Self::EmptyActor(role) => write!(f, "{role} id must not be blank"),
            Self::EmptySubjectId => write!(f, "subject id must not be blank"),
            Self::BackdatedIntoClosedCycle {
                created_at,
                frozen_until,
            } => write!(
                f,
                "created_at {created_at} is not after closed cycle boundary {frozen_until}"
            ),
        }
    }
}

impl Error for ValidationError {}

/// Trims `value` and rejects it with `error` when nothing is left.
pub(crate) fn require_text(value: &str, error: ValidationError) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(error);
    }
    Ok(trimmed.to_string())
}
