//! Record rendering: pretty JSON or one text line per record.

use conduct_core::{
    CycleClosure, CycleReversal, CycleSummary, HistoryEntry, PointEvent, Subject, SubjectStanding,
};
use serde::Serialize;

/// One-line human rendering of a record.
pub trait Line {
    fn line(&self) -> String;
}

#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    pub fn one<T: Serialize + Line>(&self, record: &T) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(record)?);
        } else {
            println!("{}", record.line());
        }
        Ok(())
    }

    pub fn many<T: Serialize + Line>(&self, records: &[T]) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(records)?);
        } else {
            for record in records {
                println!("{}", record.line());
            }
        }
        Ok(())
    }
}

impl Line for Subject {
    fn line(&self) -> String {
        format!("{}\t{}", self.id, self.current_level)
    }
}

impl Line for PointEvent {
    fn line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.id, self.subject_id, self.created_at, self.kind, self.points, self.description
        )
    }
}

impl Line for SubjectStanding {
    fn line(&self) -> String {
        format!(
            "{}\t{}\tscore={}\tprojected={}",
            self.subject.id, self.subject.current_level, self.open_score, self.projected_level
        )
    }
}

impl Line for CycleSummary {
    fn line(&self) -> String {
        let head = if self.is_head { "\thead" } else { "" };
        format!(
            "{}\t{}\tclosed_at={}\tby={}\tsubjects={}{head}",
            self.cycle.id,
            self.cycle.name,
            self.cycle.closed_at,
            self.cycle.closed_by,
            self.subject_count
        )
    }
}

impl Line for HistoryEntry {
    fn line(&self) -> String {
        let score = self
            .score_at_close
            .map_or_else(|| "-".to_string(), |score| score.to_string());
        format!(
            "{}\t{}\t{}\t{} -> {}\tscore={}\t{}\tby={}",
            self.recorded_at,
            self.subject_id,
            self.transition_type,
            self.previous_level,
            self.new_level,
            score,
            self.period,
            self.operator_id
        )
    }
}

impl Line for CycleClosure {
    fn line(&self) -> String {
        format!(
            "closed {} ({})\tclosed_at={}\tsubjects={}\tlevel_changes={}",
            self.cycle.name,
            self.cycle.id,
            self.cycle.closed_at,
            self.entries.len(),
            self.level_changes()
        )
    }
}

impl Line for CycleReversal {
    fn line(&self) -> String {
        format!(
            "reverted {} ({})\trestored={}",
            self.cycle.name, self.cycle.id, self.restored_subjects
        )
    }
}

/// Count of rows a write command touched.
#[derive(Debug, Serialize)]
pub struct Affected {
    pub action: &'static str,
    pub count: usize,
}

impl Line for Affected {
    fn line(&self) -> String {
        format!("{} {}", self.action, self.count)
    }
}

/// Numeric score of one subject.
#[derive(Debug, Serialize)]
pub struct ScoreLine {
    pub subject_id: String,
    pub score: u8,
}

impl Line for ScoreLine {
    fn line(&self) -> String {
        format!("{}\t{}", self.subject_id, self.score)
    }
}
