//! Subject (roster mirror) repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Mirror roster identities supplied by the roster provider.
//! - Hold the single authoritative `current_level` row per subject.
//!
//! # Invariants
//! - Enrollment never overwrites an existing subject's level.
//! - No delete path exists; subjects outlive every cycle.

use crate::model::level::Level;
use crate::model::subject::{Subject, SubjectId};
use crate::model::validation::{require_text, ValidationError};
use crate::repo::schema::{ensure_connection_ready, parse_level, TableSpec};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const SUBJECT_TABLES: &[TableSpec] = &[(
    "subjects",
    &["subject_id", "current_level", "enrolled_at", "updated_at"],
)];

/// Repository interface for roster subjects.
pub trait SubjectRepository {
    /// Inserts the subject when absent. Returns `false` when it already existed.
    fn enroll(&self, subject: &Subject) -> RepoResult<bool>;
    /// Enrolls every missing subject in one transaction; returns inserted count.
    fn sync_roster(&self, subjects: &[Subject]) -> RepoResult<usize>;
    fn get(&self, subject_id: &str) -> RepoResult<Option<Subject>>;
    /// Lists all subjects ordered by id.
    fn list(&self) -> RepoResult<Vec<Subject>>;
    /// Overwrites the authoritative level of one subject.
    fn set_level(&self, subject_id: &str, level: Level) -> RepoResult<()>;
}

/// SQLite-backed subject repository.
pub struct SqliteSubjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSubjectRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, SUBJECT_TABLES)?;
        Ok(Self { conn })
    }
}

impl SubjectRepository for SqliteSubjectRepository<'_> {
    fn enroll(&self, subject: &Subject) -> RepoResult<bool> {
        insert_if_absent(self.conn, subject)
    }

    fn sync_roster(&self, subjects: &[Subject]) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut inserted = 0;
        for subject in subjects {
            if insert_if_absent(&tx, subject)? {
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn get(&self, subject_id: &str) -> RepoResult<Option<Subject>> {
        let mut stmt = self.conn.prepare(
            "SELECT subject_id, current_level
             FROM subjects
             WHERE subject_id = ?1;",
        )?;
        let mut rows = stmt.query([subject_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_subject_row(row)?));
        }
        Ok(None)
    }

    fn list(&self) -> RepoResult<Vec<Subject>> {
        let mut stmt = self.conn.prepare(
            "SELECT subject_id, current_level
             FROM subjects
             ORDER BY subject_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut subjects = Vec::new();
        while let Some(row) = rows.next()? {
            subjects.push(parse_subject_row(row)?);
        }
        Ok(subjects)
    }

    fn set_level(&self, subject_id: &str, level: Level) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE subjects
             SET current_level = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE subject_id = ?1;",
            params![subject_id, level.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("subject", subject_id));
        }
        Ok(())
    }
}

fn insert_if_absent(conn: &Connection, subject: &Subject) -> RepoResult<bool> {
    let subject_id: SubjectId = require_text(&subject.id, ValidationError::EmptySubjectId)?;
    let changed = conn.execute(
        "INSERT INTO subjects (subject_id, current_level)
         VALUES (?1, ?2)
         ON CONFLICT (subject_id) DO NOTHING;",
        params![subject_id, subject.current_level.as_str()],
    )?;
    Ok(changed == 1)
}

fn parse_subject_row(row: &Row<'_>) -> RepoResult<Subject> {
    let level_text: String = row.get("current_level")?;
    Ok(Subject {
        id: row.get("subject_id")?,
        current_level: parse_level(&level_text, "subjects.current_level")?,
    })
}
