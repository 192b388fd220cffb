use clap::{Parser, Subcommand};
use conduct_core::{Level, PointKind, TransitionType};
use std::path::PathBuf;
use uuid::Uuid;

/// Top-level CLI parser for the `conduct` binary.
#[derive(Debug, Parser)]
#[command(
    name = "conduct",
    version,
    about = "Behavior scoring and cycle transition engine"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Cohort database file
    #[arg(long, global = true, env = "CONDUCT_DB")]
    pub db: Option<PathBuf>,

    /// Engine config file (JSON)
    #[arg(long, global = true, env = "CONDUCT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log directory; overrides `logging.log_dir` from the config file
    #[arg(long, global = true, env = "CONDUCT_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Print records as JSON instead of one line each
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Roster mirror commands.
    Subject {
        #[command(subcommand)]
        action: SubjectCommands,
    },
    /// Point ledger commands.
    Point {
        #[command(subcommand)]
        action: PointCommands,
    },
    /// Score of one subject, or open standings of every subject.
    Score {
        subject: Option<String>,
        /// Score a closed cycle instead of the open window
        #[arg(long)]
        cycle: Option<Uuid>,
    },
    /// Cycle closure and reversal commands.
    Cycle {
        #[command(subcommand)]
        action: CycleCommands,
    },
    /// Set a subject's level directly, bypassing the transition table.
    Manual {
        subject: String,
        #[arg(long)]
        level: Level,
        #[arg(long)]
        justification: String,
        #[arg(long)]
        operator: String,
    },
    /// Transition history, newest first.
    History {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        cycle: Option<Uuid>,
        #[arg(long = "type")]
        transition_type: Option<TransitionType>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Print the core crate version.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum SubjectCommands {
    /// Enroll subjects missing from the roster mirror.
    Enroll {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Starting level for new subjects
        #[arg(long, default_value = "BOM")]
        level: Level,
    },
    /// List subjects with their current level.
    List,
}

#[derive(Debug, Subcommand)]
pub enum PointCommands {
    /// Record one merit or demerit.
    Add {
        subject: String,
        #[arg(long)]
        kind: PointKind,
        #[arg(long, allow_negative_numbers = true)]
        points: i64,
        #[arg(long)]
        description: String,
        #[arg(long)]
        recorder: String,
        /// Explicit timestamp (epoch ms) for imports; must be after the last closure
        #[arg(long)]
        at: Option<i64>,
    },
    /// List events of one subject.
    List {
        subject: String,
        /// Events of a closed cycle instead of the open window
        #[arg(long)]
        cycle: Option<Uuid>,
    },
    /// Delete one event as a correction.
    Delete { id: Uuid },
}

#[derive(Debug, Subcommand)]
pub enum CycleCommands {
    /// Close the open window for every subject.
    Close {
        name: String,
        #[arg(long)]
        operator: String,
    },
    /// Revert the head cycle.
    Revert {
        id: Uuid,
        #[arg(long)]
        operator: String,
    },
    /// List cycles newest first.
    List,
}

impl Commands {
    /// Returns whether the command needs a cohort database.
    pub fn needs_db(&self) -> bool {
        !matches!(self, Self::Version)
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, CycleCommands, PointCommands, SubjectCommands};
    use clap::{CommandFactory, Parser};
    use conduct_core::{Level, PointKind, TransitionType};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["conduct", "cycle", "list", "--json", "--db", "c.db"])
            .expect("cli should parse");
        assert!(cli.json);
        assert_eq!(cli.db.as_deref(), Some(std::path::Path::new("c.db")));
        assert!(matches!(
            cli.command,
            Commands::Cycle {
                action: CycleCommands::List
            }
        ));
    }

    #[test]
    fn enroll_defaults_to_bom() {
        let cli = Cli::try_parse_from(["conduct", "subject", "enroll", "s-1", "s-2"])
            .expect("cli should parse");
        match cli.command {
            Commands::Subject {
                action: SubjectCommands::Enroll { ids, level },
            } => {
                assert_eq!(ids, vec!["s-1", "s-2"]);
                assert_eq!(level, Level::Bom);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn point_add_parses_kind_and_level_labels() {
        let cli = Cli::try_parse_from([
            "conduct",
            "point",
            "add",
            "s-1",
            "--kind",
            "demerit",
            "--points",
            "30",
            "--description",
            "late",
            "--recorder",
            "officer-1",
        ])
        .expect("cli should parse");
        match cli.command {
            Commands::Point {
                action: PointCommands::Add { kind, points, at, .. },
            } => {
                assert_eq!(kind, PointKind::Demerit);
                assert_eq!(points, 30);
                assert_eq!(at, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn history_type_filter_accepts_storage_label() {
        let cli = Cli::try_parse_from(["conduct", "history", "--type", "MANUAL"])
            .expect("cli should parse");
        match cli.command {
            Commands::History {
                transition_type, ..
            } => assert_eq!(transition_type, Some(TransitionType::Manual)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_level_is_rejected() {
        let parsed = Cli::try_parse_from([
            "conduct",
            "manual",
            "s-1",
            "--level",
            "GREAT",
            "--justification",
            "x",
            "--operator",
            "op",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn version_needs_no_database() {
        let cli = Cli::try_parse_from(["conduct", "version"]).expect("cli should parse");
        assert!(!cli.command.needs_db());
    }
}
