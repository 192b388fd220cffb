use conduct_core::db::open_db;
use conduct_core::score::{window_for, SCORE_MAX, SCORE_MIN};
use conduct_core::{
    compute_score, score_trace, Cycle, CycleRef, Level, NewPointEvent, PointEvent, PointKind,
    PointLedger, Score, ScoreService, SqliteCycleRepository, SqlitePointLedger,
    SqliteSubjectRepository, Subject, SubjectRepository,
};
use std::path::Path;
use std::thread;
use uuid::Uuid;

fn event(kind: PointKind, points: i64, created_at: i64) -> PointEvent {
    PointEvent {
        id: Uuid::new_v4(),
        subject_id: "s-1".to_string(),
        kind,
        points,
        description: "case".to_string(),
        created_at,
        recorder_id: "r-1".to_string(),
    }
}

/// Deterministic pseudo-random sequence so failures are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

fn random_events(seed: u64, len: usize) -> Vec<PointEvent> {
    let mut rng = Lcg(seed);
    (0..len)
        .map(|index| {
            let kind = if rng.next() % 2 == 0 {
                PointKind::Merit
            } else {
                PointKind::Demerit
            };
            let points = (rng.next() % 150) as i64 + 1;
            event(kind, points, index as i64)
        })
        .collect()
}

#[test]
fn example_a_clamps_after_every_event() {
    let events = vec![
        event(PointKind::Demerit, 30, 1),
        event(PointKind::Merit, 10, 2),
        event(PointKind::Demerit, 90, 3),
    ];

    assert_eq!(score_trace(&events, 100), vec![70, 80, 0]);
    assert_eq!(compute_score(&events, 100), 0);
}

#[test]
fn merit_after_floor_adds_to_zero_not_to_negative() {
    let events = vec![
        event(PointKind::Demerit, 150, 1),
        event(PointKind::Merit, 20, 2),
    ];

    assert_eq!(score_trace(&events, 100), vec![0, 20]);
}

#[test]
fn merit_at_ceiling_stays_at_ceiling() {
    let events = vec![
        event(PointKind::Merit, 40, 1),
        event(PointKind::Demerit, 10, 2),
    ];

    assert_eq!(score_trace(&events, 100), vec![100, 90]);
}

#[test]
fn score_never_leaves_bounds_for_any_sequence_or_baseline() {
    for seed in 0..200u64 {
        let events = random_events(seed, 40);
        for baseline in [-500, -1, 0, 37, 100, 101, 10_000] {
            for score in score_trace(&events, baseline) {
                assert!(
                    (SCORE_MIN..=SCORE_MAX).contains(&score),
                    "seed {seed} baseline {baseline} produced {score}"
                );
            }
        }
    }
}

#[test]
fn score_is_deterministic_for_identical_sequences() {
    for seed in 0..50u64 {
        let events = random_events(seed, 25);
        let first = compute_score(&events, 100);
        let second = compute_score(events.iter(), 100);
        assert_eq!(first, second);
        assert_eq!(score_trace(&events, 100).last().copied(), Some(first));
    }
}

#[test]
fn score_is_identical_across_concurrent_callers() {
    let sequences: Vec<Vec<PointEvent>> = (0..50u64).map(|seed| random_events(seed, 25)).collect();
    let expected: Vec<Score> = sequences
        .iter()
        .map(|events| compute_score(events, 100))
        .collect();

    let results: Vec<Vec<Score>> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let sequences = &sequences;
                scope.spawn(move || {
                    // Each worker walks the sequences in a different order.
                    let mut scores = vec![0; sequences.len()];
                    for step in 0..sequences.len() {
                        let index = (step * 7 + worker) % sequences.len();
                        scores[index] = compute_score(&sequences[index], 100);
                    }
                    scores
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect()
    });

    for scores in results {
        assert_eq!(scores, expected);
    }
}

#[test]
fn separate_connections_to_one_cohort_agree_on_score() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cohort.db");
    {
        let conn = open_db(&path).unwrap();
        SqliteSubjectRepository::try_new(&conn)
            .unwrap()
            .enroll(&Subject::new("s-1", Level::Bom))
            .unwrap();
        let ledger = SqlitePointLedger::try_new(&conn).unwrap();
        for (index, event) in random_events(7, 30).into_iter().enumerate() {
            let at = index as i64 + 1;
            let request = NewPointEvent::new("s-1", event.kind, event.points, "case", "r-1").at(at);
            ledger.append(&request, at).unwrap();
        }
    }

    fn open_score(path: &Path) -> Score {
        let conn = open_db(path).unwrap();
        ScoreService::new(
            SqlitePointLedger::try_new(&conn).unwrap(),
            SqliteCycleRepository::try_new(&conn).unwrap(),
            SqliteSubjectRepository::try_new(&conn).unwrap(),
            100,
        )
        .compute_score("s-1", CycleRef::Open)
        .unwrap()
    }

    let scores: Vec<Score> = thread::scope(|scope| {
        let readers: Vec<_> = (0..2)
            .map(|_| scope.spawn(|| open_score(&path)))
            .collect();
        readers
            .into_iter()
            .map(|reader| reader.join().unwrap())
            .collect()
    });

    let expected = compute_score(&random_events(7, 30), 100);
    assert_eq!(scores, vec![expected, expected]);
}

#[test]
fn huge_points_saturate_instead_of_overflowing() {
    let events = vec![
        event(PointKind::Demerit, i64::MAX, 1),
        event(PointKind::Merit, i64::MAX, 2),
    ];

    assert_eq!(score_trace(&events, 100), vec![0, 100]);
}

#[test]
fn empty_window_scores_the_clamped_baseline() {
    assert_eq!(compute_score(std::iter::empty::<&PointEvent>(), 100), 100);
    assert_eq!(compute_score(std::iter::empty::<&PointEvent>(), 250), 100);
    assert_eq!(compute_score(std::iter::empty::<&PointEvent>(), -3), 0);
}

#[test]
fn closed_window_bounds_follow_neighbouring_cycles() {
    let cycle = |closed_at| Cycle {
        id: Uuid::new_v4(),
        name: format!("c-{closed_at}"),
        closed_at,
        closed_by: "op".to_string(),
    };
    let newest = cycle(300);
    let middle = cycle(200);
    let oldest = cycle(100);
    let desc = vec![newest.clone(), middle.clone(), oldest.clone()];

    let middle_window = window_for(&desc, CycleRef::Closed(middle.id)).unwrap();
    assert!(!middle_window.contains(100));
    assert!(middle_window.contains(101));
    assert!(middle_window.contains(200));
    assert!(!middle_window.contains(201));

    let oldest_window = window_for(&desc, CycleRef::Closed(oldest.id)).unwrap();
    assert_eq!(oldest_window.after, None);
    assert!(oldest_window.contains(i64::MIN));
    assert!(oldest_window.contains(100));

    let open = window_for(&desc, CycleRef::Open).unwrap();
    assert!(!open.contains(300));
    assert!(open.contains(301));

    assert!(window_for(&desc, CycleRef::Closed(Uuid::new_v4())).is_none());
}
