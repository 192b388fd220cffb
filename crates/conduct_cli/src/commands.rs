//! Command handlers: one core call per subcommand.

use crate::cli::{Commands, CycleCommands, PointCommands, SubjectCommands};
use crate::output::{Affected, Output, ScoreLine};
use anyhow::Context;
use conduct_core::{
    AuditService, CycleManager, CycleRef, EngineConfig, HistoryQuery, LedgerService, NewPointEvent,
    ScoreService, SqliteCycleRepository, SqliteHistoryLedger, SqlitePointLedger,
    SqliteSubjectRepository, Subject, SubjectRepository,
};
use rusqlite::Connection;

pub fn dispatch(
    command: Commands,
    conn: &Connection,
    config: &EngineConfig,
    out: Output,
) -> anyhow::Result<()> {
    match command {
        Commands::Subject { action } => subject(action, conn, out),
        Commands::Point { action } => point(action, conn, config, out),
        Commands::Score { subject, cycle } => score(subject, cycle, conn, config, out),
        Commands::Cycle { action } => cycle(action, conn, config, out),
        Commands::Manual {
            subject,
            level,
            justification,
            operator,
        } => {
            let manager = CycleManager::try_new(conn, config)?;
            let entry = manager
                .manual_intervention(&subject, level, &justification, &operator)
                .with_context(|| format!("manual intervention on `{subject}` failed"))?;
            out.one(&entry)
        }
        Commands::History {
            subject,
            cycle,
            transition_type,
            limit,
            offset,
        } => {
            let audit = AuditService::new(
                SqliteCycleRepository::try_new(conn)?,
                SqliteHistoryLedger::try_new(conn)?,
            );
            let entries = audit.history(&HistoryQuery {
                subject_id: subject,
                cycle_id: cycle,
                transition_type,
                limit,
                offset,
            })?;
            out.many(&entries)
        }
        Commands::Version => version(),
    }
}

pub fn version() -> anyhow::Result<()> {
    println!("conduct_core version={}", conduct_core::core_version());
    Ok(())
}

fn subject(action: SubjectCommands, conn: &Connection, out: Output) -> anyhow::Result<()> {
    let subjects = SqliteSubjectRepository::try_new(conn)?;
    match action {
        SubjectCommands::Enroll { ids, level } => {
            let roster: Vec<Subject> = ids
                .into_iter()
                .map(|id| Subject::new(id, level))
                .collect();
            let count = subjects.sync_roster(&roster)?;
            out.one(&Affected {
                action: "enrolled",
                count,
            })
        }
        SubjectCommands::List => out.many(&subjects.list()?),
    }
}

fn point(
    action: PointCommands,
    conn: &Connection,
    config: &EngineConfig,
    out: Output,
) -> anyhow::Result<()> {
    match action {
        PointCommands::Add {
            subject,
            kind,
            points,
            description,
            recorder,
            at,
        } => {
            let ledger = LedgerService::new(SqlitePointLedger::try_new(conn)?);
            let mut request = NewPointEvent::new(subject, kind, points, description, recorder);
            if let Some(created_at) = at {
                request = request.at(created_at);
            }
            out.one(&ledger.append(&request)?)
        }
        PointCommands::List { subject, cycle } => {
            let scores = score_service(conn, config.scoring.baseline)?;
            let window = scores.resolve_window(cycle_ref(cycle))?;
            let ledger = LedgerService::new(SqlitePointLedger::try_new(conn)?);
            out.many(&ledger.events(&subject, window)?)
        }
        PointCommands::Delete { id } => {
            let ledger = LedgerService::new(SqlitePointLedger::try_new(conn)?);
            out.one(&ledger.delete(id)?)
        }
    }
}

fn score(
    subject: Option<String>,
    cycle: Option<uuid::Uuid>,
    conn: &Connection,
    config: &EngineConfig,
    out: Output,
) -> anyhow::Result<()> {
    let scores = score_service(conn, config.scoring.baseline)?;
    match subject {
        Some(subject_id) => {
            let score = scores.compute_score(&subject_id, cycle_ref(cycle))?;
            out.one(&ScoreLine { subject_id, score })
        }
        None => {
            if cycle.is_some() {
                anyhow::bail!("--cycle requires a subject");
            }
            out.many(&scores.score_all_open()?)
        }
    }
}

fn cycle(
    action: CycleCommands,
    conn: &Connection,
    config: &EngineConfig,
    out: Output,
) -> anyhow::Result<()> {
    match action {
        CycleCommands::Close { name, operator } => {
            let manager = CycleManager::try_new(conn, config)?;
            let closure = manager
                .close_cycle(&name, &operator)
                .with_context(|| format!("closing cycle `{name}` failed"))?;
            out.one(&closure)
        }
        CycleCommands::Revert { id, operator } => {
            let manager = CycleManager::try_new(conn, config)?;
            let reversal = manager
                .revert_cycle(id, &operator)
                .with_context(|| format!("reverting cycle {id} failed"))?;
            out.one(&reversal)
        }
        CycleCommands::List => {
            let audit = AuditService::new(
                SqliteCycleRepository::try_new(conn)?,
                SqliteHistoryLedger::try_new(conn)?,
            );
            out.many(&audit.cycles()?)
        }
    }
}

fn score_service(
    conn: &Connection,
    baseline: i64,
) -> anyhow::Result<
    ScoreService<SqlitePointLedger<'_>, SqliteCycleRepository<'_>, SqliteSubjectRepository<'_>>,
> {
    Ok(ScoreService::new(
        SqlitePointLedger::try_new(conn)?,
        SqliteCycleRepository::try_new(conn)?,
        SqliteSubjectRepository::try_new(conn)?,
        baseline,
    ))
}

fn cycle_ref(cycle: Option<uuid::Uuid>) -> CycleRef {
    cycle.map_or(CycleRef::Open, CycleRef::Closed)
}
