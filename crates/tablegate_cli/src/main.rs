//! CLI probe over `tablegate_core`.
//!
//! # Responsibility
//! - Verify core linkage (`ping`) independently from any host application.
//! - Run fetch/insert/validate against a configured SQLite table.
//!
//! Store and logging settings come from `TABLEGATE_*` environment
//! variables, optionally loaded from a `.env` file.

use clap::{Parser, Subcommand};
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tablegate_core::{
    core_version, init_logging_with, open_store, ping, LogConfig, Record, StoreConfig,
    TableRepository, Value,
};

#[derive(Debug, Parser)]
#[command(name = "tablegate", version, about = "Schema-driven access to one SQLite table")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core ping and version.
    Ping,
    /// Print rows as JSON, optionally filtered by `column = term`.
    Fetch {
        table: String,
        #[arg(long, requires = "term")]
        column: Option<String>,
        /// JSON scalar; anything that is not valid JSON is matched as text.
        #[arg(long, requires = "column")]
        term: Option<String>,
    },
    /// Validate and insert a JSON object, printing the new id.
    Insert { table: String, record: String },
    /// Print the violations a JSON object would raise on insert.
    Validate { table: String, record: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), Box<dyn Error>> {
    if let Err(err) = init_logging_with(&LogConfig::from_env()) {
        eprintln!("warning: file logging disabled: {err}");
    }

    match command {
        Command::Ping => {
            println!("tablegate_core ping={}", ping());
            println!("tablegate_core version={}", core_version());
        }
        Command::Fetch {
            table,
            column,
            term,
        } => {
            let repo = open_repository(&table)?;
            let term = term.as_deref().map(parse_term);
            let rows = repo.fetch_by(column.as_deref(), term.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::Insert { table, record } => {
            let record: Record = serde_json::from_str(&record)?;
            let id = open_repository(&table)?.insert(&record).await?;
            println!("{id}");
        }
        Command::Validate { table, record } => {
            let record: Record = serde_json::from_str(&record)?;
            let violations = open_repository(&table)?.validate(&record).await?;
            println!("{}", serde_json::to_string_pretty(&violations)?);
        }
    }

    Ok(())
}

fn open_repository(table: &str) -> Result<TableRepository, Box<dyn Error>> {
    let config = StoreConfig::from_env()?;
    let store = open_store(&config)?;
    Ok(TableRepository::with_store(Arc::new(store), table))
}

fn parse_term(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw))
}
