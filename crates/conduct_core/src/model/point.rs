//! Point event model.
//!
//! # Invariants
//! - `points` is strictly positive; the sign comes from `kind`.
//! - Events are never edited in place; corrections delete and re-append.

use crate::model::subject::SubjectId;
use crate::model::validation::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of one point event.
pub type PointEventId = Uuid;

/// Direction of a point event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    /// Adds points, capped at the score ceiling.
    Merit,
    /// Removes points, floored at zero.
    Demerit,
}

impl PointKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merit => "merit",
            Self::Demerit => "demerit",
        }
    }
}

impl Display for PointKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PointKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "merit" => Ok(Self::Merit),
            "demerit" => Ok(Self::Demerit),
            _ => Err(ValidationError::UnknownPointKind(value.to_string())),
        }
    }
}

/// Persisted point occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointEvent {
    pub id: PointEventId,
    pub subject_id: SubjectId,
    pub kind: PointKind,
    pub points: i64,
    pub description: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub recorder_id: String,
}

/// Write request for the point ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPointEvent {
    pub subject_id: SubjectId,
    pub kind: PointKind,
    pub points: i64,
    pub description: String,
    pub recorder_id: String,
    /// Explicit timestamp for imported events. `None` stamps the event at
    /// append time, never earlier than the head cycle boundary.
    pub created_at: Option<i64>,
}

impl NewPointEvent {
    pub fn new(
        subject_id: impl Into<SubjectId>,
        kind: PointKind,
        points: i64,
        description: impl Into<String>,
        recorder_id: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            kind,
            points,
            description: description.into(),
            recorder_id: recorder_id.into(),
            created_at: None,
        }
    }

    /// Pins the event timestamp (epoch ms), used by imports and replays.
    pub fn at(mut self, created_at: i64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Validates and normalizes the request before it reaches storage.
    pub fn validate(&self) -> Result<Self, ValidationError> {
        if self.points <= 0 {
            return Err(ValidationError::NonPositivePoints(self.points));
        }
        Ok(Self {
            subject_id: require_text(&self.subject_id, ValidationError::EmptySubjectId)?,
            kind: self.kind,
            points: self.points,
            description: self.description.trim().to_string(),
            recorder_id: require_text(&self.recorder_id, ValidationError::EmptyActor("recorder"))?,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{NewPointEvent, PointKind};
    use crate::model::validation::ValidationError;

    #[test]
    fn validate_rejects_zero_and_negative_points() {
        let zero = NewPointEvent::new("s-1", PointKind::Merit, 0, "late", "officer");
        assert_eq!(zero.validate(), Err(ValidationError::NonPositivePoints(0)));

        let negative = NewPointEvent::new("s-1", PointKind::Demerit, -5, "late", "officer");
        assert_eq!(
            negative.validate(),
            Err(ValidationError::NonPositivePoints(-5))
        );
    }

    #[test]
    fn validate_trims_identities() {
        let request = NewPointEvent::new(" s-1 ", PointKind::Merit, 3, " helped ", " officer ");
        let normalized = request.validate().unwrap();
        assert_eq!(normalized.subject_id, "s-1");
        assert_eq!(normalized.recorder_id, "officer");
        assert_eq!(normalized.description, "helped");
    }

    #[test]
    fn kind_parse_rejects_unknown_values() {
        assert_eq!("Merit".parse::<PointKind>().unwrap(), PointKind::Merit);
        assert!(matches!(
            "bonus".parse::<PointKind>(),
            Err(ValidationError::UnknownPointKind(value)) if value == "bonus"
        ));
    }
}
