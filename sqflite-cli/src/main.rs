//! `sqflite` developer CLI.
//!
//! Drives the bridge against database files on disk: `exec` runs one SQL
//! string, `script` replays JSON-lines calls read from stdin.

mod database;
mod script;

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use sqflite_core::{initialize, ApiVersion, Bridge, BridgeConfig};
use tracing_subscriber::EnvFilter;

/// Run SQL through the sqflite bridge.
#[derive(Parser, Debug)]
#[command(name = "sqflite", author, version, about, long_about = None)]
struct Cli {
    /// Bridge configuration as JSON, e.g. `{"pragmas": ["PRAGMA foreign_keys = ON"]}`.
    #[arg(long, env = "SQFLITE_CONFIG", global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute SQL and print the first result set as JSON.
    Exec {
        /// Database file. A missing file starts an empty database.
        db: PathBuf,
        /// SQL to execute.
        sql: String,
        /// Write the database back to `db` afterwards.
        #[arg(long)]
        save: bool,
    },
    /// Replay JSON-lines calls from stdin, printing one reply per line.
    Script {
        /// Database file. A missing file starts an empty database.
        db: PathBuf,
        /// Function set the call names belong to.
        #[arg(long, value_parser = ApiVersion::from_str)]
        api: Option<ApiVersion>,
        /// Write the database back to `db` afterwards.
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries replies; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = match cli.config.as_deref() {
        Some(json) => BridgeConfig::from_json(json).wrap_err("invalid --config")?,
        None => BridgeConfig::default(),
    };
    if let Command::Script { api: Some(api), .. } = &cli.command {
        config = config.with_api_version(*api);
    }

    let mut bridge = initialize(config).await?;

    match cli.command {
        Command::Exec { db, sql, save } => {
            open(&mut bridge, &db)?;
            let result = bridge.execute(&sql)?;
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &result)?;
            writeln!(stdout)?;
            if save {
                database::save(&bridge, &db)?;
            }
        }
        Command::Script { db, save, .. } => {
            open(&mut bridge, &db)?;
            let stdin = io::stdin().lock();
            let stdout = BufWriter::new(io::stdout().lock());
            let summary = script::run(&mut bridge, stdin, stdout)?;
            tracing::info!(
                calls = summary.calls,
                failed = summary.failed,
                "script finished"
            );
            if save {
                database::save(&bridge, &db)?;
            }
        }
    }

    Ok(())
}

fn open(bridge: &mut Bridge, path: &std::path::Path) -> Result<()> {
    let image = database::load(path)?;
    bridge
        .open(&image)
        .wrap_err_with(|| format!("failed to open {}", path.display()))
}
