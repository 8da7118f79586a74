//! obratrack-import - load levels, materials and photos into the database
//!
//! Input is a single JSON document:
//!
//! ```json
//! { "levels": [...], "materials": [...], "photos": [...] }
//! ```
//!
//! Records use the same camelCase field names as the report payload. Levels
//! may appear in any order; parents are inserted before their children. The
//! whole bundle is written in one transaction, so a failed import leaves the
//! database untouched.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use obratrack_core::{Config, Database, Level, Material, Photo};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "obratrack-import")]
#[command(about = "Import levels, materials and photos from a JSON file")]
#[command(version)]
struct Args {
    /// JSON file to import; `-` reads stdin
    input: PathBuf,

    /// Database file (defaults to the configured path)
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bundle {
    #[serde(default)]
    levels: Vec<Level>,
    #[serde(default)]
    materials: Vec<Material>,
    #[serde(default)]
    photos: Vec<Photo>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        obratrack_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let raw = read_input(&args.input)?;
    let bundle: Bundle = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.resolved_database_path());
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    db.migrate().context("failed to run database migrations")?;

    let summary = db
        .import_bundle(&bundle.levels, &bundle.materials, &bundle.photos)
        .context("import failed, nothing was written")?;

    tracing::info!(db = %db_path.display(), "Import complete");

    println!("Import complete:");
    println!("  Levels:    {}", summary.levels);
    println!("  Materials: {}", summary.materials);
    println!("  Photos:    {}", summary.photos);

    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
