//! Parcel Viewer - map inspection for processed GPX surveys
//!
//! CLI commands:
//! - gui: open the interactive map viewer for a result file
//! - inspect: print a processing summary without a GUI

mod config;
mod gui;
mod logging;
mod map;
mod model;
mod tiles;
mod view;
mod viewer;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use model::{BatchResult, ProcessingResult, ResultSet, ResultStatus};

#[derive(Parser)]
#[command(name = "parcel_viewer")]
#[command(about = "Interactive map viewer for processed GPX parcel surveys")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to viewer.yaml config
    #[arg(short, long, default_value = "viewer.yaml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive viewer for a result or batch file
    Gui {
        /// Result JSON produced by the processing backend
        file: PathBuf,
    },

    /// Print a summary of a result or batch file
    Inspect {
        /// Result JSON produced by the processing backend
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    logging::init_logging("logs");
    tracing::info!("Parcel Viewer starting up");

    let cli = Cli::parse();
    tracing::debug!("CLI args parsed: config={:?}", cli.config);

    let mut config = if cli.config.exists() {
        tracing::info!("Loading config from {:?}", cli.config);
        config::ViewerConfig::load(&cli.config)?
    } else {
        tracing::warn!("Config file not found: {:?}, using defaults", cli.config);
        config::ViewerConfig::default()
    };
    config.apply_env(&config::Env::load());

    match cli.command {
        Commands::Gui { file } => {
            let set = load_result_set(&file)?;
            tracing::info!("Launching viewer for {:?}", file);
            gui::run_viewer(config, set)?;
        }

        Commands::Inspect { file } => {
            let set = load_result_set(&file)?;
            inspect(&set);
        }
    }

    Ok(())
}

/// Read and parse a result-set document.
fn load_result_set(path: &Path) -> anyhow::Result<ResultSet> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    ResultSet::from_json(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Print a human-readable summary of a result set.
fn inspect(set: &ResultSet) {
    match set {
        ResultSet::Single(result) => print_result(result, None),
        ResultSet::Batch(batch) => print_batch(batch),
    }
}

fn print_result(result: &ProcessingResult, index: Option<usize>) {
    let prefix = index.map(|i| format!("{:>3}. ", i + 1)).unwrap_or_default();
    let status = match result.status {
        ResultStatus::Completed => "OK",
        ResultStatus::Error => "ERROR",
    };
    let points = result
        .validation
        .as_ref()
        .map(|v| v.total_points.to_string())
        .unwrap_or_else(|| "-".to_string());
    let area = result
        .area
        .as_ref()
        .map(|a| format!("{:.2} ha", a.area_hectares))
        .unwrap_or_else(|| "-".to_string());

    println!(
        "{}{} [{}] points: {}  area: {}  corrections: {}",
        prefix,
        result.filename,
        status,
        points,
        area,
        result.total_corrections()
    );
    if let Some(message) = &result.error_message {
        println!("{}     {}", prefix, message);
    }
}

fn print_batch(batch: &BatchResult) {
    let summary = &batch.batch_summary;
    println!("Batch {} — {} files", batch.batch_id, summary.total_files);
    println!(
        "  processed: {}  errors: {}  skipped: {}  total area: {:.2} ha  corrections: {}",
        summary.processed,
        summary.errors,
        summary.skipped,
        summary.total_area_hectares,
        summary.total_corrections
    );
    println!();

    for (index, result) in batch.results.iter().enumerate() {
        print_result(result, Some(index));
    }

    if !batch.skipped_files.is_empty() {
        println!();
        println!("Skipped files ({}):", batch.skipped_files.len());
        for skipped in &batch.skipped_files {
            println!("  - {} ({})", skipped.filename, skipped.reason);
        }
    }
}
