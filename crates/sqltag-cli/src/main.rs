//! sqltag CLI - run a parameterized query through a query tag.
//!
//! `QUERY` uses `{}` markers where values go; each `--value` fills the next
//! marker. Values are read as JSON (`42`, `1.5`, `null`, `"text"`) and fall
//! back to plain text. Result rows are printed to stdout as a JSON array per
//! run, and the cache statistics are printed after the last run.

use anyhow::{Context, Result};
use clap::Parser;
use sqltag::{Database, QueryTagConfig, Template, Value};
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sqltag-cli")]
#[command(about = "Run parameterized SQLite queries with statement caching")]
struct Args {
    /// SQL with `{}` markers for values
    query: String,

    /// Value for the next `{}` marker (repeatable)
    #[arg(short, long = "value")]
    values: Vec<String>,

    /// SQLite database file (in-memory when omitted)
    #[arg(long)]
    database: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the statement cache capacity
    #[arg(long)]
    cache_capacity: Option<usize>,

    /// SQL script to run before the query
    #[arg(long)]
    script: Option<PathBuf>,

    /// Number of times to run the query
    #[arg(long, default_value = "1")]
    repeat: usize,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; stdout carries the rows
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = load_config(&args)?;
    debug!("Cache capacity: {}", config.cache_capacity);

    let db = match &args.database {
        Some(path) => {
            info!("Opening database: {}", path.display());
            Database::open(path, config)?
        }
        None => Database::open_in_memory(config)?,
    };

    if let Some(script) = &args.script {
        let sql = std::fs::read_to_string(script)
            .with_context(|| format!("Failed to read script {}", script.display()))?;
        db.execute_batch(&sql)?;
        info!("Ran script {}", script.display());
    }

    let values = args.values.iter().map(String::as_str).map(parse_value).collect();
    let template = Template::from_marked(&args.query, values);

    let mut tag = db.query_tag();
    for _ in 0..args.repeat {
        let rows = tag.query(&template)?;
        println!("{}", serde_json::to_string(&rows)?);
    }

    let stats = tag.cache_stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        size = stats.size,
        "Query finished"
    );
    println!("{}", serde_json::to_string(&stats)?);

    Ok(())
}

/// Config file first, then the command-line override.
fn load_config(args: &Args) -> Result<QueryTagConfig> {
    let mut config = match &args.config {
        Some(path) => QueryTagConfig::from_file(path)?,
        None => QueryTagConfig::default(),
    };
    if let Some(capacity) = args.cache_capacity {
        config.cache_capacity = capacity;
    }
    Ok(config)
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw))
}
