//! Engine configuration.
//!
//! # Responsibility
//! - Describe tunables for scoring, cohort locking and logging.
//! - Load them from JSON with every field defaulted.
//!
//! # Invariants
//! - A validated config always has a baseline inside `[0, 100]`.

use crate::logging::default_log_level;
use crate::score::{DEFAULT_BASELINE, SCORE_MAX, SCORE_MIN};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub locking: LockingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Score every window starts from.
    pub baseline: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            baseline: i64::from(DEFAULT_BASELINE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockingConfig {
    /// How long a cycle operation waits for the cohort lock before it
    /// reports a conflict. Zero fails immediately.
    pub lock_wait_ms: u64,
    /// Busy timeout for ordinary statements.
    pub busy_timeout_ms: u64,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            lock_wait_ms: 0,
            busy_timeout_ms: 5_000,
        }
    }
}

impl LockingConfig {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`.
    pub level: String,
    /// Absolute directory for rolling log files. `None` leaves logging off.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

/// Errors from loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    BaselineOutOfRange(i64),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::BaselineOutOfRange(value) => write!(
                f,
                "scoring.baseline must be within {SCORE_MIN}..={SCORE_MAX}, got {value}"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::BaselineOutOfRange(_) => None,
        }
    }
}

impl EngineConfig {
    /// Parses and validates configuration from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let baseline = self.scoring.baseline;
        if !(i64::from(SCORE_MIN)..=i64::from(SCORE_MAX)).contains(&baseline) {
            return Err(ConfigError::BaselineOutOfRange(baseline));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};

    #[test]
    fn empty_object_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.scoring.baseline, 100);
        assert_eq!(config.locking.lock_wait_ms, 0);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"scoring": {"baseline": 80}, "locking": {"lock_wait_ms": 250}}"#)
                .unwrap();
        assert_eq!(config.scoring.baseline, 80);
        assert_eq!(config.locking.lock_wait_ms, 250);
        assert_eq!(config.locking.busy_timeout_ms, 5_000);
    }

    #[test]
    fn baseline_outside_score_range_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{"scoring": {"baseline": 120}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::BaselineOutOfRange(120)));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = EngineConfig::from_json_str(r#"{"scoring": {"base": 90}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }
}
