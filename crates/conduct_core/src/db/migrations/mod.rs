//! Cohort schema migrations.
//!
//! # Responsibility
//! - Keep the ordered list of schema steps for a cohort database.
//! - Bring a database from its stored version to the latest one in a single
//!   write transaction.
//!
//! # Invariants
//! - Versions start at 1 and increase by exactly one per step.
//! - `PRAGMA user_version` only moves forward, and only after its step's SQL ran.
//! - Two processes opening the same fresh file apply each step once.

use crate::db::{DbError, DbResult};
use log::{debug, error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "init",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "audit_guards",
        sql: include_str!("0002_audit_guards.sql"),
    },
];

/// What one call to [`apply_migrations`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    /// Names of the steps run, oldest first.
    pub applied: Vec<&'static str>,
}

impl MigrationReport {
    fn unchanged(version: u32) -> Self {
        Self {
            from_version: version,
            to_version: version,
            applied: Vec::new(),
        }
    }

    /// Returns whether the schema was already current.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

fn pending(from_version: u32) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS
        .iter()
        .filter(move |migration| migration.version > from_version)
}

fn ensure_supported(version: u32) -> DbResult<()> {
    let latest = latest_version();
    if version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: version,
            latest_supported: latest,
        });
    }
    Ok(())
}

/// Brings the cohort schema up to [`latest_version`].
///
/// An up-to-date database is left alone without taking the write lock.
/// Otherwise the stored version is read again under `BEGIN IMMEDIATE`, so a
/// concurrent opener that already migrated turns this run into a no-op.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<MigrationReport> {
    let observed = current_user_version(conn)?;
    ensure_supported(observed)?;
    if observed == latest_version() {
        debug!("event=db_migrate module=db status=skipped version={observed}");
        return Ok(MigrationReport::unchanged(observed));
    }

    let started_at = Instant::now();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let from_version = current_user_version(&tx)?;
    ensure_supported(from_version)?;
    let to_version = latest_version();
    info!(
        "event=db_migrate module=db status=start from_version={from_version} to_version={to_version}"
    );

    let mut applied = Vec::new();
    for migration in pending(from_version) {
        let step = tx.execute_batch(migration.sql).and_then(|()| {
            tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
        });
        if let Err(source) = step {
            error!(
                "event=db_migrate module=db status=error from_version={} to_version={} failed_version={} name={} duration_ms={} error={}",
                from_version,
                to_version,
                migration.version,
                migration.name,
                started_at.elapsed().as_millis(),
                source
            );
            return Err(DbError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            });
        }
        applied.push(migration.name);
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} applied={} duration_ms={}",
        from_version,
        to_version,
        applied.join(","),
        started_at.elapsed().as_millis()
    );
    Ok(MigrationReport {
        from_version,
        to_version,
        applied,
    })
}

/// Reads the schema version stored in `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::{latest_version, pending, MIGRATIONS};

    #[test]
    fn versions_are_contiguous_from_one() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, index + 1, "{}", migration.name);
        }
        assert_eq!(latest_version() as usize, MIGRATIONS.len());
    }

    #[test]
    fn pending_skips_applied_steps() {
        let names: Vec<_> = pending(1).map(|migration| migration.name).collect();
        assert_eq!(names, vec!["audit_guards"]);
        assert_eq!(pending(latest_version()).count(), 0);
    }
}
