//! History ledger contracts and SQLite implementation.
//!
//! # Responsibility
//! - Append level transition records and serve them to the audit viewer.
//! - Remove AUTO records only together with their reverted cycle.
//!
//! # Invariants
//! - Listing is newest first: `recorded_at DESC`, then insertion order DESC.
//! - MANUAL records are never deleted (the schema aborts such deletes).

use crate::model::cycle::CycleId;
use crate::model::history::{HistoryEntry, TransitionType};
use crate::repo::schema::{
    ensure_connection_ready, is_foreign_key_violation, parse_level, parse_uuid, TableSpec,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const HISTORY_SELECT_SQL: &str = "SELECT
    entry_id,
    subject_id,
    cycle_id,
    previous_level,
    new_level,
    score_at_close,
    transition_type,
    justification,
    period,
    operator_id,
    recorded_at
FROM history_entries";

const HISTORY_TABLES: &[TableSpec] = &[(
    "history_entries",
    &[
        "entry_id",
        "subject_id",
        "cycle_id",
        "previous_level",
        "new_level",
        "score_at_close",
        "transition_type",
        "justification",
        "period",
        "operator_id",
        "recorded_at",
    ],
)];

/// Query options for the audit viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub subject_id: Option<String>,
    pub cycle_id: Option<CycleId>,
    pub transition_type: Option<TransitionType>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for the append-only history ledger.
pub trait HistoryLedger {
    fn append(&self, entry: &HistoryEntry) -> RepoResult<()>;
    /// AUTO entries written by one cycle closure, ordered by subject id.
    fn list_for_cycle(&self, cycle_id: CycleId) -> RepoResult<Vec<HistoryEntry>>;
    /// Deletes the AUTO entries of one cycle; returns how many were removed.
    fn delete_auto_for_cycle(&self, cycle_id: CycleId) -> RepoResult<usize>;
    /// Newest-first listing with optional filters and pagination.
    fn list(&self, query: &HistoryQuery) -> RepoResult<Vec<HistoryEntry>>;
}

/// SQLite-backed history ledger.
pub struct SqliteHistoryLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHistoryLedger<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, HISTORY_TABLES)?;
        Ok(Self { conn })
    }
}

impl HistoryLedger for SqliteHistoryLedger<'_> {
    fn append(&self, entry: &HistoryEntry) -> RepoResult<()> {
        self.conn
            .execute(
                "INSERT INTO history_entries (
                    entry_id,
                    subject_id,
                    cycle_id,
                    previous_level,
                    new_level,
                    score_at_close,
                    transition_type,
                    justification,
                    period,
                    operator_id,
                    recorded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
                params![
                    entry.id.to_string(),
                    entry.subject_id.as_str(),
                    entry.cycle_id.map(|id| id.to_string()),
                    entry.previous_level.as_str(),
                    entry.new_level.as_str(),
                    entry.score_at_close,
                    entry.transition_type.as_str(),
                    entry.justification.as_str(),
                    entry.period.as_str(),
                    entry.operator_id.as_str(),
                    entry.recorded_at,
                ],
            )
            .map_err(|err| {
                if is_foreign_key_violation(&err) {
                    RepoError::not_found("subject", &entry.subject_id)
                } else {
                    err.into()
                }
            })?;
        Ok(())
    }

    fn list_for_cycle(&self, cycle_id: CycleId) -> RepoResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{HISTORY_SELECT_SQL}
             WHERE cycle_id = ?1
               AND transition_type = 'AUTO'
             ORDER BY subject_id ASC;"
        ))?;
        let mut rows = stmt.query([cycle_id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_history_row(row)?);
        }
        Ok(entries)
    }

    fn delete_auto_for_cycle(&self, cycle_id: CycleId) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM history_entries
             WHERE cycle_id = ?1
               AND transition_type = 'AUTO';",
            [cycle_id.to_string()],
        )?;
        Ok(removed)
    }

    fn list(&self, query: &HistoryQuery) -> RepoResult<Vec<HistoryEntry>> {
        let mut sql = format!("{HISTORY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(subject_id) = query.subject_id.as_ref() {
            sql.push_str(" AND subject_id = ?");
            bind_values.push(Value::Text(subject_id.clone()));
        }
        if let Some(cycle_id) = query.cycle_id {
            sql.push_str(" AND cycle_id = ?");
            bind_values.push(Value::Text(cycle_id.to_string()));
        }
        if let Some(transition_type) = query.transition_type {
            sql.push_str(" AND transition_type = ?");
            bind_values.push(Value::Text(transition_type.as_str().to_string()));
        }

        sql.push_str(" ORDER BY recorded_at DESC, rowid DESC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_history_row(row)?);
        }
        Ok(entries)
    }
}

fn parse_history_row(row: &Row<'_>) -> RepoResult<HistoryEntry> {
    let id_text: String = row.get("entry_id")?;
    let cycle_id = row
        .get::<_, Option<String>>("cycle_id")?
        .map(|value| parse_uuid(&value, "history_entries.cycle_id"))
        .transpose()?;
    let previous_text: String = row.get("previous_level")?;
    let new_text: String = row.get("new_level")?;
    let type_text: String = row.get("transition_type")?;
    let transition_type = type_text.parse::<TransitionType>().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid transition type `{type_text}` in history_entries.transition_type"
        ))
    })?;

    Ok(HistoryEntry {
        id: parse_uuid(&id_text, "history_entries.entry_id")?,
        subject_id: row.get("subject_id")?,
        cycle_id,
        previous_level: parse_level(&previous_text, "history_entries.previous_level")?,
        new_level: parse_level(&new_text, "history_entries.new_level")?,
        score_at_close: row.get("score_at_close")?,
        transition_type,
        justification: row.get("justification")?,
        period: row.get("period")?,
        operator_id: row.get("operator_id")?,
        recorded_at: row.get("recorded_at")?,
    })
}
