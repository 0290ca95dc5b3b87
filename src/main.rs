//! `sqlite-mirror` CLI: each command runs one mirror pipeline and exits.
//! Errors are logged, printed as `Error! in <kind>: <message>` and exit with status 1.
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use sqlite_mirror::{shape_pairs, IdentifierPolicy, Mirror, MirrorConfig, MirrorError, Value};

#[derive(Parser)]
#[command(
    name = "sqlite-mirror",
    version,
    about = "Mirror SQLite tables into memory, query them, write tuples back"
)]
struct Cli {
    #[arg(long, global = true, help = "JSON config file (stride, ceiling, termination, ...)")]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Splice identifiers into SQL unchecked instead of validating them"
    )]
    raw_identifiers: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy a disk table into memory, optionally querying the copy
    Load {
        #[arg(long, help = "Disk database file")]
        disk: PathBuf,
        #[arg(long, help = "Table to read from the disk database")]
        source: String,
        #[arg(long, help = "In-memory table to create and fill")]
        table: String,
        #[arg(long, help = "Column definitions for the in-memory table, e.g. \"a, b\"")]
        attributes: String,
        #[arg(long, requires = "pattern")]
        column: Option<String>,
        #[arg(long, requires = "column", help = "LIKE pattern, e.g. foo%")]
        pattern: Option<String>,
    },
    /// LIKE query against a disk table (indexes the column first)
    Query {
        #[arg(long)]
        disk: PathBuf,
        #[arg(long)]
        table: String,
        #[arg(long)]
        column: String,
        #[arg(long)]
        pattern: String,
    },
    /// Create an index on a disk table if it does not exist
    Index {
        #[arg(long)]
        disk: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        table: String,
        #[arg(long)]
        column: String,
    },
    /// Shape `k0 v0 k1 v1 ...` into pairs and insert them into a disk table
    Write {
        #[arg(long)]
        disk: PathBuf,
        #[arg(long)]
        table: String,
        #[arg(required = true, help = "Flat key/value literals")]
        values: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = failure_kind(&err);
            error!(kind, error = %format!("{err:#}"), "mirror failed");
            eprintln!("{}", failure_message(&err));
            ExitCode::FAILURE
        }
    }
}

/// Taxonomy label of the failed operation; errors not raised by the mirror
/// itself are attributed to the controller.
fn failure_kind(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<MirrorError>()
        .map_or("controller", MirrorError::kind)
}

fn failure_message(err: &anyhow::Error) -> String {
    format!("Error! in {}: {err:#}", failure_kind(err))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<MirrorConfig> {
    let mut config = match &cli.config {
        Some(path) => MirrorConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MirrorConfig::default(),
    };
    if cli.raw_identifiers {
        config.identifiers = IdentifierPolicy::Raw;
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let mirror = Mirror::new(load_config(&cli)?)?;
    match cli.command {
        Command::Load {
            disk,
            source,
            table,
            attributes,
            column,
            pattern,
        } => {
            mirror.create_memory_table(&table, &attributes).await?;
            let report = mirror.load_from_disk(&disk, &source, &table).await?;
            println!("{}", serde_json::to_string(&report)?);
            if let (Some(column), Some(pattern)) = (column, pattern) {
                let rows = mirror.select_from_memory(&table, &column, &pattern).await?;
                println!("{}", serde_json::to_string(&rows)?);
            }
        }
        Command::Query {
            disk,
            table,
            column,
            pattern,
        } => {
            let values = mirror
                .select_from_disk(&disk, &table, &column, &pattern)
                .await?;
            println!("{}", serde_json::to_string(&values)?);
        }
        Command::Index {
            disk,
            name,
            table,
            column,
        } => {
            mirror.create_disk_index(&disk, &name, &table, &column).await?;
        }
        Command::Write {
            disk,
            table,
            values,
        } => {
            let literals: Vec<Value> = values.iter().map(|v| Value::parse_literal(v)).collect();
            let pairs = shape_pairs(literals);
            let written = mirror.write_to_disk(&disk, &table, &pairs).await?;
            println!("{written}");
        }
    }
    Ok(())
}
