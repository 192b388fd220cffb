//! Disciplinary level state machine.
//!
//! # Responsibility
//! - Define the six recognized levels and their storage labels.
//! - Map `(current level, closing score)` to the next level.
//!
//! # Invariants
//! - `transition` is total over every level and every score.
//! - `Mau` is absorbing: no score moves a subject out of it automatically.

use crate::model::validation::ValidationError;
use crate::score::Score;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Qualitative disciplinary classification of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Excepcional,
    Otimo,
    Bom,
    Regular,
    Insuficiente,
    Mau,
}

impl Level {
    /// Every level, best first.
    pub const ALL: [Level; 6] = [
        Level::Excepcional,
        Level::Otimo,
        Level::Bom,
        Level::Regular,
        Level::Insuficiente,
        Level::Mau,
    ];

    /// Stable storage/display label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excepcional => "EXCEPCIONAL",
            Self::Otimo => "OTIMO",
            Self::Bom => "BOM",
            Self::Regular => "REGULAR",
            Self::Insuficiente => "INSUFICIENTE",
            Self::Mau => "MAU",
        }
    }

    /// Returns whether automatic transitions can never leave this level.
    pub fn is_absorbing(self) -> bool {
        self == Self::Mau
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ValidationError;

    /// Parses a level label, ignoring case and surrounding whitespace.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownLevel(value.to_string()))
    }
}

/// Computes the level a subject moves to when a cycle closes with `score`.
///
/// | current      | >=80        | 70-79       | 60-69   | 40-59        | 30-39        | <30          |
/// |--------------|-------------|-------------|---------|--------------|--------------|--------------|
/// | EXCEPCIONAL  | EXCEPCIONAL | OTIMO       | OTIMO   | OTIMO        | OTIMO        | OTIMO        |
/// | OTIMO        | EXCEPCIONAL | EXCEPCIONAL | OTIMO   | OTIMO        | BOM          | BOM          |
/// | BOM          | OTIMO       | OTIMO       | BOM     | BOM          | REGULAR      | REGULAR      |
/// | REGULAR      | BOM         | BOM         | REGULAR | REGULAR      | INSUFICIENTE | INSUFICIENTE |
/// | INSUFICIENTE | REGULAR     | REGULAR     | REGULAR | INSUFICIENTE | INSUFICIENTE | MAU          |
/// | MAU          | MAU         | MAU         | MAU     | MAU          | MAU          | MAU          |
pub fn transition(current: Level, score: Score) -> Level {
    match current {
        Level::Excepcional => {
            if score >= 80 {
                Level::Excepcional
            } else {
                Level::Otimo
            }
        }
        Level::Otimo => step(score, 70, 40, Level::Excepcional, Level::Otimo, Level::Bom),
        Level::Bom => step(score, 70, 40, Level::Otimo, Level::Bom, Level::Regular),
        Level::Regular => step(score, 70, 40, Level::Bom, Level::Regular, Level::Insuficiente),
        Level::Insuficiente => step(
            score,
            60,
            30,
            Level::Regular,
            Level::Insuficiente,
            Level::Mau,
        ),
        Level::Mau => Level::Mau,
    }
}

fn step(score: Score, promote_at: Score, keep_at: Score, up: Level, stay: Level, down: Level) -> Level {
    if score >= promote_at {
        up
    } else if score >= keep_at {
        stay
    } else {
        down
    }
}

#[cfg(test)]
mod tests {
    use super::{transition, Level};

    #[test]
    fn parse_accepts_any_case_and_rejects_unknown_labels() {
        assert_eq!(" otimo ".parse::<Level>().unwrap(), Level::Otimo);
        assert_eq!("INSUFICIENTE".parse::<Level>().unwrap(), Level::Insuficiente);
        assert!("PESSIMO".parse::<Level>().is_err());
    }

    #[test]
    fn labels_roundtrip_through_from_str() {
        for level in Level::ALL {
            assert_eq!(level.as_str().parse::<Level>().unwrap(), level);
        }
    }

    #[test]
    fn excepcional_needs_eighty_to_stay() {
        assert_eq!(transition(Level::Excepcional, 80), Level::Excepcional);
        assert_eq!(transition(Level::Excepcional, 79), Level::Otimo);
        assert_eq!(transition(Level::Excepcional, 0), Level::Otimo);
    }

    #[test]
    fn only_mau_is_absorbing() {
        let absorbing: Vec<Level> = Level::ALL
            .into_iter()
            .filter(|level| level.is_absorbing())
            .collect();
        assert_eq!(absorbing, vec![Level::Mau]);
    }
}
