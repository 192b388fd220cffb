//! Evaluated subject model.
//!
//! Subjects are supplied by the roster provider; the engine only mirrors
//! their identity and owns their `current_level`.

use crate::model::level::Level;
use serde::{Deserialize, Serialize};

/// External identity of a subject, as issued by the roster provider.
pub type SubjectId = String;

/// One roster member with its authoritative level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub current_level: Level,
}

impl Subject {
    pub fn new(id: impl Into<SubjectId>, current_level: Level) -> Self {
        Self {
            id: id.into(),
            current_level,
        }
    }
}
