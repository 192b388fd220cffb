//! Operator entry point for one cohort database.
//!
//! # Responsibility
//! - Resolve config, logging and database from flags and `CONDUCT_*` env.
//! - Dispatch each subcommand to exactly one core operation.

use anyhow::Context;
use clap::Parser;
use conduct_core::{init_logging, open_db_with, EngineConfig};

mod cli;
mod commands;
mod output;

fn main() {
    if let Err(error) = run() {
        eprintln!("conduct error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let out = output::Output { json: cli.json };

    if !cli.command.needs_db() {
        return commands::version();
    }

    let config = load_config(&cli)?;
    if config.logging.log_dir.is_some() {
        init_logging(&config.logging)
            .map_err(anyhow::Error::msg)
            .context("failed to initialize logging")?;
    }

    let db_path = cli
        .db
        .as_deref()
        .context("no cohort database given; pass --db or set CONDUCT_DB")?;
    let conn = open_db_with(db_path, config.locking.busy_timeout())
        .with_context(|| format!("failed to open cohort database {}", db_path.display()))?;

    let result = commands::dispatch(cli.command, &conn, &config, out);
    if let Err(error) = &result {
        log::error!("event=cli_command module=cli status=error error={error}");
    }
    result
}

fn load_config(cli: &cli::Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let log_dir = if log_dir.is_absolute() {
            log_dir.to_path_buf()
        } else {
            std::env::current_dir()
                .context("failed to resolve current directory")?
                .join(log_dir)
        };
        config.logging.log_dir = Some(log_dir);
    }
    Ok(config)
}
