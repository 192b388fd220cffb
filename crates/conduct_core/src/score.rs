//! Score calculator and scoring-window selection.
//!
//! Pure computation over already-loaded records; no storage, no IO.
//!
//! # Invariants
//! - The running score is clamped to `[SCORE_MIN, SCORE_MAX]` after every
//!   single event, so a merit following a floored demerit adds to zero.
//! - Identical event sequences always yield identical scores.
//! - A closed cycle's window is `(previous.closed_at, cycle.closed_at]`; the
//!   open window is everything after the head cycle.

use crate::model::cycle::{Cycle, CycleRef};
use crate::model::point::{PointEvent, PointKind};
use serde::{Deserialize, Serialize};

/// Bounded disciplinary score.
pub type Score = u8;

pub const SCORE_MIN: Score = 0;
pub const SCORE_MAX: Score = 100;

/// Starting score of every scoring window.
pub const DEFAULT_BASELINE: Score = SCORE_MAX;

/// Folds events, in the given order, into a bounded score.
///
/// `baseline` outside `[0, 100]` is clamped before the first event applies.
/// Callers pass events sorted ascending by `created_at`, the order the point
/// ledger returns them in.
pub fn compute_score<'a, I>(events: I, baseline: i64) -> Score
where
    I: IntoIterator<Item = &'a PointEvent>,
{
    events
        .into_iter()
        .fold(clamp(baseline), |score, event| apply(score, event))
}

/// Same fold as [`compute_score`], returning the score after each event.
pub fn score_trace<'a, I>(events: I, baseline: i64) -> Vec<Score>
where
    I: IntoIterator<Item = &'a PointEvent>,
{
    let mut score = clamp(baseline);
    events
        .into_iter()
        .map(|event| {
            score = apply(score, event);
            score
        })
        .collect()
}

fn apply(score: Score, event: &PointEvent) -> Score {
    let current = i64::from(score);
    let next = match event.kind {
        PointKind::Merit => current.saturating_add(event.points),
        PointKind::Demerit => current.saturating_sub(event.points),
    };
    clamp(next)
}

fn clamp(value: i64) -> Score {
    // Lossless: the value is within 0..=100 after the clamp.
    value.clamp(i64::from(SCORE_MIN), i64::from(SCORE_MAX)) as Score
}

/// Time bounds of one scoring window, in epoch milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWindow {
    /// Exclusive lower bound. `None` means from the first event ever.
    pub after: Option<i64>,
    /// Inclusive upper bound. `None` means unbounded.
    pub until: Option<i64>,
}

impl ScoreWindow {
    /// Window after the given head boundary, open-ended.
    pub fn open_after(head_closed_at: Option<i64>) -> Self {
        Self {
            after: head_closed_at,
            until: None,
        }
    }

    pub fn contains(&self, created_at: i64) -> bool {
        self.after.map_or(true, |after| created_at > after)
            && self.until.map_or(true, |until| created_at <= until)
    }
}

/// Resolves the window for `cycle_ref` against cycles sorted by `closed_at`
/// descending (head first).
///
/// Returns `None` when `cycle_ref` names a cycle not present in `cycles_desc`.
pub fn window_for(cycles_desc: &[Cycle], cycle_ref: CycleRef) -> Option<ScoreWindow> {
    match cycle_ref {
        CycleRef::Open => Some(ScoreWindow::open_after(
            cycles_desc.first().map(|head| head.closed_at),
        )),
        CycleRef::Closed(cycle_id) => {
            let position = cycles_desc.iter().position(|cycle| cycle.id == cycle_id)?;
            Some(ScoreWindow {
                after: cycles_desc.get(position + 1).map(|older| older.closed_at),
                until: Some(cycles_desc[position].closed_at),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{compute_score, score_trace, window_for, ScoreWindow};
    use crate::model::cycle::{Cycle, CycleRef};
    use crate::model::point::{PointEvent, PointKind};
    use uuid::Uuid;

    fn event(kind: PointKind, points: i64, created_at: i64) -> PointEvent {
        PointEvent {
            id: Uuid::new_v4(),
            subject_id: "s-1".to_string(),
            kind,
            points,
            description: String::new(),
            created_at,
            recorder_id: "officer".to_string(),
        }
    }

    fn cycle(closed_at: i64) -> Cycle {
        Cycle {
            id: Uuid::new_v4(),
            name: format!("cycle-{closed_at}"),
            closed_at,
            closed_by: "officer".to_string(),
        }
    }

    #[test]
    fn floor_applies_per_event_not_at_the_end() {
        let events = vec![
            event(PointKind::Demerit, 30, 1),
            event(PointKind::Merit, 10, 2),
            event(PointKind::Demerit, 90, 3),
        ];
        assert_eq!(score_trace(&events, 100), vec![70, 80, 0]);
        assert_eq!(compute_score(&events, 100), 0);
    }

    #[test]
    fn merit_after_floor_adds_to_zero() {
        let events = vec![
            event(PointKind::Demerit, 150, 1),
            event(PointKind::Merit, 20, 2),
        ];
        assert_eq!(compute_score(&events, 100), 20);
    }

    #[test]
    fn ceiling_applies_per_event() {
        let events = vec![
            event(PointKind::Merit, 50, 1),
            event(PointKind::Demerit, 10, 2),
        ];
        assert_eq!(compute_score(&events, 90), 90);
    }

    #[test]
    fn out_of_range_baseline_is_clamped_first() {
        assert_eq!(compute_score(std::iter::empty::<&PointEvent>(), 250), 100);
        assert_eq!(compute_score(std::iter::empty::<&PointEvent>(), -40), 0);
        let events = vec![event(PointKind::Merit, 5, 1)];
        assert_eq!(compute_score(&events, -40), 5);
    }

    #[test]
    fn extreme_point_values_saturate() {
        let events = vec![
            event(PointKind::Demerit, i64::MAX, 1),
            event(PointKind::Merit, i64::MAX, 2),
        ];
        assert_eq!(score_trace(&events, 100), vec![0, 100]);
    }

    #[test]
    fn open_window_starts_after_head() {
        let cycles = vec![cycle(300), cycle(200), cycle(100)];
        let window = window_for(&cycles, CycleRef::Open).unwrap();
        assert_eq!(window, ScoreWindow::open_after(Some(300)));
        assert!(!window.contains(300));
        assert!(window.contains(301));

        let empty = window_for(&[], CycleRef::Open).unwrap();
        assert!(empty.contains(i64::MIN));
    }

    #[test]
    fn closed_window_is_exclusive_below_and_inclusive_above() {
        let cycles = vec![cycle(300), cycle(200), cycle(100)];

        let middle = window_for(&cycles, CycleRef::Closed(cycles[1].id)).unwrap();
        assert_eq!(middle.after, Some(100));
        assert_eq!(middle.until, Some(200));
        assert!(!middle.contains(100));
        assert!(middle.contains(101));
        assert!(middle.contains(200));
        assert!(!middle.contains(201));

        let oldest = window_for(&cycles, CycleRef::Closed(cycles[2].id)).unwrap();
        assert_eq!(oldest.after, None);
        assert_eq!(oldest.until, Some(100));
    }

    #[test]
    fn unknown_cycle_has_no_window() {
        let cycles = vec![cycle(100)];
        assert!(window_for(&cycles, CycleRef::Closed(Uuid::new_v4())).is_none());
    }
}
