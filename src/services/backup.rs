//! Read-only access to a backup SQLite file
//!
//! Shared by the vocabulary copier and the post importer.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Open the backup file read-only with a single connection. The caller
/// must `close()` the pool when done.
pub async fn open_backup(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open backup database: {}", path.display()))
}

/// Column names of `table`, in declaration order
pub async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
        .bind(table)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to read columns of {}", table))?;
    Ok(columns)
}

/// Parse a timestamp as written by this application (RFC 3339) or by the
/// previous site (`YYYY-MM-DD HH:MM:SS[.ffffff]`, UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2023-04-05T06:07:08+02:00").unwrap();
        assert_eq!(rfc.hour(), 4);

        let django = parse_timestamp("2023-04-05 06:07:08.123456").unwrap();
        assert_eq!((django.year(), django.month(), django.day()), (2023, 4, 5));
        assert_eq!(django.nanosecond(), 123_456_000);

        assert!(parse_timestamp("2023-04-05 06:07:08").is_some());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("ayer").is_none());
    }

    #[tokio::test]
    async fn test_open_backup_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.sqlite3");
        {
            let writable = SqlitePoolOptions::new()
                .connect_with(SqliteConnectOptions::new().filename(&path).create_if_missing(true))
                .await
                .unwrap();
            sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
                .execute(&writable)
                .await
                .unwrap();
            writable.close().await;
        }

        let pool = open_backup(&path).await.unwrap();
        assert_eq!(table_columns(&pool, "t").await.unwrap(), vec!["id", "name"]);
        assert!(sqlx::query("INSERT INTO t (name) VALUES ('x')")
            .execute(&pool)
            .await
            .is_err());
        pool.close().await;
    }
}
