//! obratrack-report - print the progress report of one obra as JSON
//!
//! Reads the level tree from the local database and writes the report payload
//! (KPIs, nested progress, materials, issue photos, completed tasks and
//! monthly stats) to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use obratrack_core::report::{ReportRange, ReportService};
use obratrack_core::{Config, Database, Error};

#[derive(Parser)]
#[command(name = "obratrack-report")]
#[command(about = "Generate the progress report for an obra")]
#[command(version)]
struct Args {
    /// Obra (root level) ID
    #[arg(short, long)]
    obra: i64,

    /// First day of the report range (YYYY-MM-DD)
    #[arg(long)]
    from: String,

    /// Last day of the report range, inclusive (YYYY-MM-DD)
    #[arg(long)]
    to: String,

    /// Database file (defaults to the configured path)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Anchor monthly stats to this date instead of the current UTC date
    #[arg(long, value_parser = parse_day)]
    today: Option<NaiveDate>,

    /// Single-line JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,
}

fn parse_day(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", s, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        obratrack_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Validate before touching the database
    let range = ReportRange::parse(&args.from, &args.to)?;

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.resolved_database_path());
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    db.migrate().context("failed to run database migrations")?;

    let service = ReportService::new(Arc::new(db), config.report.clone());

    let result = service
        .generate_with_timeout(args.obra, &range, args.today)
        .await;

    let report = match result {
        Ok(report) => report,
        Err(Error::LevelNotFound(id)) => anyhow::bail!("Obra {} not found", id),
        Err(e) => return Err(e).context("failed to generate report"),
    };

    let json = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{}", json);

    Ok(())
}
