//! Import blog posts from a backup SQLite file into the live database.
//!
//! Usage: `migrate-posts`
//!
//! The backup is read from `backup.path` in `config.yml` (or
//! `CASIPE_BACKUP_PATH`). Authors are matched by id, falling back to the
//! first superuser; taken slugs get a numeric suffix.

use anyhow::Result;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casipe::config::Config;
use casipe::services::post_import::{import_into_database, ImportReport};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "casipe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(report) => {
            println!(
                "Migration complete: {} of {} posts migrated, {} failed",
                report.migrated, report.total, report.failed
            );
            if report.failed > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error migrating posts: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ImportReport> {
    let config = Config::load_with_env(Path::new("config.yml"))?;
    Ok(import_into_database(&config.database, &config.backup.path).await?)
}
