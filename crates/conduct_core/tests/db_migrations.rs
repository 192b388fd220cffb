use conduct_core::db::migrations::{apply_migrations, current_user_version, latest_version};
use conduct_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "subjects");
    assert_table_exists(&conn, "point_events");
    assert_table_exists(&conn, "cycles");
    assert_table_exists(&conn, "history_entries");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cohort.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "history_entries");
}

#[test]
fn file_database_uses_wal_journal() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("cohort.db")).unwrap();

    let mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_ascii_lowercase(), "wal");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn version_one_database_gains_audit_guards_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");
    let mut conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0001_init.sql"))
        .unwrap();
    conn.execute_batch("PRAGMA user_version = 1;").unwrap();

    let report = apply_migrations(&mut conn).unwrap();
    assert_eq!(report.from_version, 1);
    assert_eq!(report.to_version, latest_version());
    assert_eq!(report.applied, vec!["audit_guards"]);
    assert_trigger_exists(&conn, "history_entries_keep_manual");

    let again = apply_migrations(&mut conn).unwrap();
    assert!(again.is_noop());
    assert_eq!(again.from_version, latest_version());
}

#[test]
fn failed_step_names_the_migration_and_keeps_the_old_version() {
    let mut conn = Connection::open_in_memory().unwrap();
    // Claims version 1 without the tables the next step builds on.
    conn.execute_batch("PRAGMA user_version = 1;").unwrap();

    let err = apply_migrations(&mut conn).unwrap_err();
    match &err {
        DbError::Migration { version, name, .. } => {
            assert_eq!(*version, 2);
            assert_eq!(*name, "audit_guards");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("audit_guards"));
    assert_eq!(current_user_version(&conn).unwrap(), 1);
}

#[test]
fn point_events_reject_updates() {
    let conn = open_db_in_memory().unwrap();
    seed_subject(&conn, "s-1");
    conn.execute(
        "INSERT INTO point_events
         (event_id, subject_id, kind, points, description, created_at, recorder_id)
         VALUES ('e-1', 's-1', 'merit', 5, 'help', 10, 'r-1');",
        [],
    )
    .unwrap();

    let err = conn
        .execute("UPDATE point_events SET points = 50 WHERE event_id = 'e-1';", [])
        .unwrap_err();
    assert!(err.to_string().contains("immutable"));
}

#[test]
fn manual_history_entries_cannot_be_deleted() {
    let conn = open_db_in_memory().unwrap();
    seed_subject(&conn, "s-1");
    conn.execute(
        "INSERT INTO history_entries
         (entry_id, subject_id, cycle_id, previous_level, new_level, score_at_close,
          transition_type, justification, period, operator_id, recorded_at)
         VALUES ('h-1', 's-1', NULL, 'MAU', 'REGULAR', NULL,
                 'MANUAL', 'appeal granted', 'manual', 'op-1', 10);",
        [],
    )
    .unwrap();

    let err = conn
        .execute("DELETE FROM history_entries WHERE entry_id = 'h-1';", [])
        .unwrap_err();
    assert!(err.to_string().contains("cannot be deleted"));
}

#[test]
fn auto_history_entries_require_cycle_and_score() {
    let conn = open_db_in_memory().unwrap();
    seed_subject(&conn, "s-1");

    let result = conn.execute(
        "INSERT INTO history_entries
         (entry_id, subject_id, cycle_id, previous_level, new_level, score_at_close,
          transition_type, justification, period, operator_id, recorded_at)
         VALUES ('h-1', 's-1', NULL, 'BOM', 'OTIMO', 75,
                 'AUTO', 'closure', 'Q1', 'op-1', 10);",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn cycles_closed_at_is_unique() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO cycles (cycle_id, name, closed_at, closed_by) VALUES ('c-1', 'Q1', 100, 'op');",
        [],
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO cycles (cycle_id, name, closed_at, closed_by) VALUES ('c-2', 'Q2', 100, 'op');",
        [],
    );
    assert!(result.is_err());
}

fn seed_subject(conn: &Connection, subject_id: &str) {
    conn.execute(
        "INSERT INTO subjects (subject_id, current_level) VALUES (?1, 'BOM');",
        [subject_id],
    )
    .unwrap();
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}

fn assert_trigger_exists(conn: &Connection, trigger_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'trigger' AND name = ?1
            );",
            [trigger_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "trigger {trigger_name} does not exist");
}
