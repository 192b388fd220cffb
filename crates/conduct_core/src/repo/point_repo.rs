//! Point ledger contracts and SQLite implementation.
//!
//! # Responsibility
//! - Append, query and delete point events.
//! - Stamp live events so they always fall after the head cycle boundary.
//! - Refuse imported events that would land inside a closed cycle.
//!
//! # Invariants
//! - Queries return events ascending by `created_at`, ties in insertion order.
//! - Events are never updated; the schema rejects UPDATE outright.

use crate::model::point::{NewPointEvent, PointEvent, PointEventId};
use crate::model::subject::SubjectId;
use crate::model::validation::ValidationError;
use crate::repo::schema::{ensure_connection_ready, is_foreign_key_violation, parse_uuid, TableSpec};
use crate::repo::{RepoError, RepoResult};
use crate::score::ScoreWindow;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use uuid::Uuid;

const POINT_SELECT_SQL: &str = "SELECT
    event_id,
    subject_id,
    kind,
    points,
    description,
    created_at,
    recorder_id
FROM point_events";

const POINT_TABLES: &[TableSpec] = &[
    (
        "point_events",
        &[
            "event_id",
            "subject_id",
            "kind",
            "points",
            "description",
            "created_at",
            "recorder_id",
        ],
    ),
    ("cycles", &["closed_at"]),
];

/// Repository interface for the append-only point ledger.
pub trait PointLedger {
    /// Validates and appends one event, returning the stored record.
    ///
    /// Without an explicit `created_at` the event is stamped
    /// `max(now_ms, head.closed_at + 1)`. An explicit `created_at` at or
    /// before the head boundary is rejected with
    /// [`ValidationError::BackdatedIntoClosedCycle`].
    fn append(&self, event: &NewPointEvent, now_ms: i64) -> RepoResult<PointEvent>;
    fn get(&self, event_id: PointEventId) -> RepoResult<Option<PointEvent>>;
    /// Events of one subject inside `window`, ascending by time.
    fn query(&self, subject_id: &str, window: ScoreWindow) -> RepoResult<Vec<PointEvent>>;
    /// Events of every subject inside `window`, grouped by subject.
    fn query_all(&self, window: ScoreWindow) -> RepoResult<BTreeMap<SubjectId, Vec<PointEvent>>>;
    /// Removes one event and returns what was removed.
    fn delete(&self, event_id: PointEventId) -> RepoResult<PointEvent>;
    /// `closed_at` of the head cycle: events at or before it are frozen.
    fn frozen_until(&self) -> RepoResult<Option<i64>>;
}

/// SQLite-backed point ledger.
pub struct SqlitePointLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePointLedger<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, POINT_TABLES)?;
        Ok(Self { conn })
    }
}

impl PointLedger for SqlitePointLedger<'_> {
    fn append(&self, event: &NewPointEvent, now_ms: i64) -> RepoResult<PointEvent> {
        let event = event.validate()?;
        let event_id = Uuid::new_v4();

        let stored: Option<i64> = self
            .conn
            .query_row(
                "INSERT INTO point_events (
                    event_id,
                    subject_id,
                    kind,
                    points,
                    description,
                    created_at,
                    recorder_id
                )
                SELECT
                    ?1, ?2, ?3, ?4, ?5,
                    COALESCE(?6, MAX(?7, COALESCE((SELECT MAX(closed_at) + 1 FROM cycles), ?7))),
                    ?8
                WHERE ?6 IS NULL
                   OR NOT EXISTS (SELECT 1 FROM cycles WHERE closed_at >= ?6)
                RETURNING created_at;",
                params![
                    event_id.to_string(),
                    event.subject_id.as_str(),
                    event.kind.as_str(),
                    event.points,
                    event.description.as_str(),
                    event.created_at,
                    now_ms,
                    event.recorder_id.as_str(),
                ],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| {
                if is_foreign_key_violation(&err) {
                    RepoError::not_found("subject", &event.subject_id)
                } else {
                    err.into()
                }
            })?;

        // An explicit timestamp inside a closed window inserts nothing.
        let created_at = match (stored, event.created_at) {
            (Some(created_at), _) => created_at,
            (None, Some(created_at)) => {
                let frozen_until = self.frozen_until()?.unwrap_or(created_at);
                return Err(ValidationError::BackdatedIntoClosedCycle {
                    created_at,
                    frozen_until,
                }
                .into());
            }
            (None, None) => return Err(rusqlite::Error::QueryReturnedNoRows.into()),
        };

        Ok(PointEvent {
            id: event_id,
            subject_id: event.subject_id,
            kind: event.kind,
            points: event.points,
            description: event.description,
            created_at,
            recorder_id: event.recorder_id,
        })
    }

    fn get(&self, event_id: PointEventId) -> RepoResult<Option<PointEvent>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{POINT_SELECT_SQL} WHERE event_id = ?1;"))?;
        let mut rows = stmt.query([event_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_point_row(row)?));
        }
        Ok(None)
    }

    fn query(&self, subject_id: &str, window: ScoreWindow) -> RepoResult<Vec<PointEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "{POINT_SELECT_SQL}
             WHERE subject_id = ?1
               AND (?2 IS NULL OR created_at > ?2)
               AND (?3 IS NULL OR created_at <= ?3)
             ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query(params![subject_id, window.after, window.until])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_point_row(row)?);
        }
        Ok(events)
    }

    fn query_all(&self, window: ScoreWindow) -> RepoResult<BTreeMap<SubjectId, Vec<PointEvent>>> {
        let mut stmt = self.conn.prepare(&format!(
            "{POINT_SELECT_SQL}
             WHERE (?1 IS NULL OR created_at > ?1)
               AND (?2 IS NULL OR created_at <= ?2)
             ORDER BY subject_id ASC, created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query(params![window.after, window.until])?;
        let mut grouped: BTreeMap<SubjectId, Vec<PointEvent>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let event = parse_point_row(row)?;
            grouped
                .entry(event.subject_id.clone())
                .or_default()
                .push(event);
        }
        Ok(grouped)
    }

    fn delete(&self, event_id: PointEventId) -> RepoResult<PointEvent> {
        let event = self
            .get(event_id)?
            .ok_or_else(|| RepoError::not_found("point event", event_id))?;
        let changed = self.conn.execute(
            "DELETE FROM point_events WHERE event_id = ?1;",
            [event_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("point event", event_id));
        }
        Ok(event)
    }

    fn frozen_until(&self) -> RepoResult<Option<i64>> {
        let boundary = self
            .conn
            .query_row("SELECT MAX(closed_at) FROM cycles;", [], |row| row.get(0))?;
        Ok(boundary)
    }
}

fn parse_point_row(row: &Row<'_>) -> RepoResult<PointEvent> {
    let id_text: String = row.get("event_id")?;
    let kind_text: String = row.get("kind")?;
    let kind = kind_text.parse().map_err(|_| {
        RepoError::InvalidData(format!("invalid point kind `{kind_text}` in point_events.kind"))
    })?;
    let points: i64 = row.get("points")?;
    if points <= 0 {
        return Err(RepoError::InvalidData(format!(
            "non-positive points `{points}` in point_events.points"
        )));
    }

    Ok(PointEvent {
        id: parse_uuid(&id_text, "point_events.event_id")?,
        subject_id: row.get("subject_id")?,
        kind,
        points,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        recorder_id: row.get("recorder_id")?,
    })
}
