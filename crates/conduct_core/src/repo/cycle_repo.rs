//! Cycle repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Listing is ordered by `closed_at DESC`; the first row is the head.
//! - `closed_at` is unique per cohort, so the head is never ambiguous.

use crate::model::cycle::{Cycle, CycleId, CycleSummary};
use crate::repo::schema::{ensure_connection_ready, parse_uuid, TableSpec};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const CYCLE_SELECT_SQL: &str = "SELECT cycle_id, name, closed_at, closed_by FROM cycles";

const CYCLE_TABLES: &[TableSpec] = &[
    ("cycles", &["cycle_id", "name", "closed_at", "closed_by"]),
    ("history_entries", &["entry_id", "cycle_id"]),
];

/// Repository interface for closed cycles.
pub trait CycleRepository {
    fn insert(&self, cycle: &Cycle) -> RepoResult<()>;
    fn get(&self, cycle_id: CycleId) -> RepoResult<Option<Cycle>>;
    /// All cycles, newest first.
    fn list_desc(&self) -> RepoResult<Vec<Cycle>>;
    /// The most recently closed cycle, if any.
    fn head(&self) -> RepoResult<Option<Cycle>>;
    /// Newest-first cycles with head flag and AUTO entry counts.
    fn list_summaries(&self) -> RepoResult<Vec<CycleSummary>>;
    fn delete(&self, cycle_id: CycleId) -> RepoResult<()>;
}

/// SQLite-backed cycle repository.
pub struct SqliteCycleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCycleRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, CYCLE_TABLES)?;
        Ok(Self { conn })
    }
}

impl CycleRepository for SqliteCycleRepository<'_> {
    fn insert(&self, cycle: &Cycle) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO cycles (cycle_id, name, closed_at, closed_by)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                cycle.id.to_string(),
                cycle.name.as_str(),
                cycle.closed_at,
                cycle.closed_by.as_str(),
            ],
        )?;
        Ok(())
    }

    fn get(&self, cycle_id: CycleId) -> RepoResult<Option<Cycle>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CYCLE_SELECT_SQL} WHERE cycle_id = ?1;"))?;
        let mut rows = stmt.query([cycle_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_cycle_row(row)?));
        }
        Ok(None)
    }

    fn list_desc(&self) -> RepoResult<Vec<Cycle>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CYCLE_SELECT_SQL} ORDER BY closed_at DESC;"))?;
        let mut rows = stmt.query([])?;
        let mut cycles = Vec::new();
        while let Some(row) = rows.next()? {
            cycles.push(parse_cycle_row(row)?);
        }
        Ok(cycles)
    }

    fn head(&self) -> RepoResult<Option<Cycle>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CYCLE_SELECT_SQL} ORDER BY closed_at DESC LIMIT 1;"))?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_cycle_row(row)?));
        }
        Ok(None)
    }

    fn list_summaries(&self) -> RepoResult<Vec<CycleSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                c.cycle_id AS cycle_id,
                c.name AS name,
                c.closed_at AS closed_at,
                c.closed_by AS closed_by,
                COUNT(h.entry_id) AS subject_count
             FROM cycles c
             LEFT JOIN history_entries h ON h.cycle_id = c.cycle_id
             GROUP BY c.cycle_id
             ORDER BY c.closed_at DESC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            let cycle = parse_cycle_row(row)?;
            summaries.push(CycleSummary {
                cycle,
                is_head: summaries.is_empty(),
                subject_count: row.get("subject_count")?,
            });
        }
        Ok(summaries)
    }

    fn delete(&self, cycle_id: CycleId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM cycles WHERE cycle_id = ?1;",
            [cycle_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("cycle", cycle_id));
        }
        Ok(())
    }
}

fn parse_cycle_row(row: &Row<'_>) -> RepoResult<Cycle> {
    let id_text: String = row.get("cycle_id")?;
    Ok(Cycle {
        id: parse_uuid(&id_text, "cycles.cycle_id")?,
        name: row.get("name")?,
        closed_at: row.get("closed_at")?,
        closed_by: row.get("closed_by")?,
    })
}
