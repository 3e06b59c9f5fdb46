//! Copy the temario vocabulary from a backup SQLite file into the live
//! database.
//!
//! Usage: `copy-database [--backup-path <file>] [--layout <name>]`
//!
//! Thematic categories, words, word/category links and example sentences in
//! the live database are replaced by the backup's rows, ids included.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casipe::config::Config;
use casipe::services::backup_copy::{copy_into_database, CopyReport, StepOutcome};

#[derive(Debug, Parser)]
#[command(name = "copy-database", version, about = "Copy vocabulary data from a backup database to the live database")]
struct Args {
    /// Backup SQLite file (defaults to backup.path from the configuration)
    #[arg(long)]
    backup_path: Option<PathBuf>,

    /// Backup schema: native, django-blog or django-temario (detected when omitted)
    #[arg(long)]
    layout: Option<String>,

    /// Live database URL or path (defaults to database.url from the configuration)
    #[arg(long)]
    database: Option<String>,

    /// Configuration file
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "casipe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(report) if report.has_failures() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error during data copy: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<CopyReport> {
    let mut config = Config::load_with_env(&args.config)?;
    if let Some(url) = args.database {
        config.database.url = url;
    }
    let backup_path = args.backup_path.unwrap_or(config.backup.path);

    println!("Starting data copy from backup to live database...");
    let report =
        copy_into_database(&config.database, &backup_path, args.layout.as_deref()).await?;
    print_report(&report);
    Ok(report)
}

fn print_report(report: &CopyReport) {
    println!("Backup layout: {}", report.layout);
    for step in &report.steps {
        match &step.outcome {
            StepOutcome::Copied(n) => println!("Copied {} {}", n, step.step),
            StepOutcome::Skipped(reason) => println!("Warning: {}", reason),
            StepOutcome::Failed(reason) => println!("Error: {}", reason),
        }
    }
    if report.has_failures() {
        println!("Data copy finished with errors");
    } else {
        println!("Data successfully copied from backup to live database");
    }
}
