//! Backup-to-live vocabulary copier
//!
//! Replaces the live thematic categories, words, word/category links and
//! example sentences with the rows of a backup SQLite file. The backup
//! schema is never guessed: each supported schema is declared below as a
//! [`SourceLayout`] mapping its tables and columns onto the live ones.
//!
//! The backup is read and checked first. All four steps then run in one
//! live transaction with foreign keys deferred to commit. Row ids are
//! preserved. Live rows of a skipped or failed step survive the replacement
//! of their parents as long as the parent row is still there.

use crate::config::DatabaseConfig;
use crate::db::migrations::{run_migrations, table_exists};
use crate::db::{create_pool, DynDatabasePool};
use crate::services::backup::{open_backup, parse_timestamp, table_columns};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection};
use std::fmt;
use std::path::{Path, PathBuf};

/// How a column value is read from the backup and written to the live table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    /// Text timestamp normalized to UTC; unparseable or missing values become
    /// the copy time
    Timestamp,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnMapping {
    pub source: &'static str,
    pub dest: &'static str,
    pub kind: ColumnKind,
}

const fn col(source: &'static str, dest: &'static str, kind: ColumnKind) -> ColumnMapping {
    ColumnMapping { source, dest, kind }
}

/// The four copy steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStep {
    ThematicCategories,
    Words,
    WordCategories,
    ExampleSentences,
}

impl CopyStep {
    pub fn label(&self) -> &'static str {
        match self {
            CopyStep::ThematicCategories => "thematic categories",
            CopyStep::Words => "words",
            CopyStep::WordCategories => "word-category relationships",
            CopyStep::ExampleSentences => "example sentences",
        }
    }

    /// Link rows have no identity of their own; a broken link table only
    /// fails its own step.
    fn is_link(&self) -> bool {
        matches!(self, CopyStep::WordCategories)
    }

    /// Steps whose deletion cascades into this step's live rows
    fn parents(&self) -> &'static [CopyStep] {
        match self {
            CopyStep::ThematicCategories | CopyStep::Words => &[],
            CopyStep::WordCategories => &[CopyStep::Words, CopyStep::ThematicCategories],
            CopyStep::ExampleSentences => &[CopyStep::Words],
        }
    }

    fn parent_filter(&self) -> &'static str {
        match self {
            CopyStep::ThematicCategories | CopyStep::Words => "1",
            CopyStep::WordCategories => {
                "word_id IN (SELECT id FROM words) \
                 AND category_id IN (SELECT id FROM thematic_categories)"
            }
            CopyStep::ExampleSentences => "word_id IN (SELECT id FROM words)",
        }
    }
}

impl fmt::Display for CopyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableMapping {
    pub step: CopyStep,
    pub source_table: &'static str,
    pub dest_table: &'static str,
    pub columns: &'static [ColumnMapping],
}

/// A known backup schema
#[derive(Debug, Clone, Copy)]
pub struct SourceLayout {
    pub name: &'static str,
    pub version: u32,
    pub tables: [TableMapping; 4],
}

impl SourceLayout {
    fn words_table(&self) -> &'static str {
        self.tables[1].source_table
    }
}

use ColumnKind::{Integer, Text, Timestamp};

const CATEGORY_COLUMNS: &[ColumnMapping] = &[
    col("id", "id", Integer),
    col("name", "name", Text),
    col("description", "description", Text),
];

const WORD_COLUMNS: &[ColumnMapping] = &[
    col("id", "id", Integer),
    col("text", "text", Text),
    col("definition", "definition", Text),
    col("gender", "gender", Text),
    col("has_gender", "has_gender", Integer),
    col("created_at", "created_at", Timestamp),
    col("updated_at", "updated_at", Timestamp),
];

const EXAMPLE_COLUMNS: &[ColumnMapping] = &[
    col("id", "id", Integer),
    col("word_id", "word_id", Integer),
    col("text", "text", Text),
    col("translation", "translation", Text),
    col("created_at", "created_at", Timestamp),
];

const NATIVE_LINK_COLUMNS: &[ColumnMapping] = &[
    col("word_id", "word_id", Integer),
    col("category_id", "category_id", Integer),
];

const DJANGO_LINK_COLUMNS: &[ColumnMapping] = &[
    col("word_id", "word_id", Integer),
    col("thematiccategory_id", "category_id", Integer),
];

const fn django_layout(name: &'static str, app: DjangoApp) -> SourceLayout {
    let (categories, words, links, examples) = match app {
        DjangoApp::Blog => (
            "blog_thematiccategory",
            "blog_word",
            "blog_word_thematic_categories",
            "blog_examplesentence",
        ),
        DjangoApp::Temario => (
            "temario_thematiccategory",
            "temario_word",
            "temario_word_thematic_categories",
            "temario_examplesentence",
        ),
    };
    SourceLayout {
        name,
        version: 1,
        tables: [
            TableMapping {
                step: CopyStep::ThematicCategories,
                source_table: categories,
                dest_table: "thematic_categories",
                columns: CATEGORY_COLUMNS,
            },
            TableMapping {
                step: CopyStep::Words,
                source_table: words,
                dest_table: "words",
                columns: WORD_COLUMNS,
            },
            TableMapping {
                step: CopyStep::WordCategories,
                source_table: links,
                dest_table: "word_thematic_categories",
                columns: DJANGO_LINK_COLUMNS,
            },
            TableMapping {
                step: CopyStep::ExampleSentences,
                source_table: examples,
                dest_table: "example_sentences",
                columns: EXAMPLE_COLUMNS,
            },
        ],
    }
}

enum DjangoApp {
    Blog,
    Temario,
}

/// This application's own schema (a copy of another casipe database)
pub const NATIVE_LAYOUT: SourceLayout = SourceLayout {
    name: "native",
    version: 6,
    tables: [
        TableMapping {
            step: CopyStep::ThematicCategories,
            source_table: "thematic_categories",
            dest_table: "thematic_categories",
            columns: CATEGORY_COLUMNS,
        },
        TableMapping {
            step: CopyStep::Words,
            source_table: "words",
            dest_table: "words",
            columns: WORD_COLUMNS,
        },
        TableMapping {
            step: CopyStep::WordCategories,
            source_table: "word_thematic_categories",
            dest_table: "word_thematic_categories",
            columns: NATIVE_LINK_COLUMNS,
        },
        TableMapping {
            step: CopyStep::ExampleSentences,
            source_table: "example_sentences",
            dest_table: "example_sentences",
            columns: EXAMPLE_COLUMNS,
        },
    ],
};

/// Previous site, vocabulary living in the `blog` app
pub const DJANGO_BLOG_LAYOUT: SourceLayout = django_layout("django-blog", DjangoApp::Blog);

/// Previous site, vocabulary living in the `temario` app
pub const DJANGO_TEMARIO_LAYOUT: SourceLayout = django_layout("django-temario", DjangoApp::Temario);

/// Layouts in detection order
pub const LAYOUTS: [SourceLayout; 3] = [NATIVE_LAYOUT, DJANGO_BLOG_LAYOUT, DJANGO_TEMARIO_LAYOUT];

pub fn find_layout(name: &str) -> Option<SourceLayout> {
    LAYOUTS.iter().copied().find(|l| l.name == name)
}

#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("Backup file not found: {}", .0.display())]
    BackupNotFound(PathBuf),

    #[error("Unknown backup layout '{0}' (expected one of: native, django-blog, django-temario)")]
    UnknownLayout(String),

    #[error("No known vocabulary tables found in backup")]
    NoMatchingLayout,

    #[error("Table {table} is missing columns: {}", .columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

/// Result of one copy step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Copied(u64),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: CopyStep,
    pub source_table: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct CopyReport {
    pub layout: &'static str,
    pub steps: Vec<StepReport>,
}

impl CopyReport {
    pub fn copied(&self, step: CopyStep) -> Option<u64> {
        self.steps
            .iter()
            .find(|s| s.step == step)
            .and_then(|s| match s.outcome {
                StepOutcome::Copied(n) => Some(n),
                _ => None,
            })
    }

    pub fn has_failures(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }
}

/// Copy the vocabulary tables of `backup_path` into `live`.
///
/// With `layout` unset, the first declared layout whose words table exists in
/// the backup is used.
pub async fn copy_backup(
    live: &DynDatabasePool,
    backup_path: &Path,
    layout: Option<&str>,
) -> Result<CopyReport, CopyError> {
    if !backup_path.is_file() {
        return Err(CopyError::BackupNotFound(backup_path.to_path_buf()));
    }
    let requested = match layout {
        Some(name) => Some(find_layout(name).ok_or_else(|| CopyError::UnknownLayout(name.to_string()))?),
        None => None,
    };

    tracing::info!("Starting data copy from {}", backup_path.display());
    let source = open_backup(backup_path).await?;
    let result = copy_from_source(live.sqlite(), &source, requested).await;
    source.close().await;
    result
}

/// Open the live database described by `database`, bring its schema up to
/// date and copy the backup into it.
///
/// The backup path and layout name are checked first; when either is wrong
/// the live database is never opened, so a missing file cannot create it.
pub async fn copy_into_database(
    database: &DatabaseConfig,
    backup_path: &Path,
    layout: Option<&str>,
) -> Result<CopyReport, CopyError> {
    if !backup_path.is_file() {
        return Err(CopyError::BackupNotFound(backup_path.to_path_buf()));
    }
    if let Some(name) = layout {
        find_layout(name).ok_or_else(|| CopyError::UnknownLayout(name.to_string()))?;
    }

    let live = create_pool(database).await?;
    let result = match run_migrations(&live).await {
        Ok(_) => copy_backup(&live, backup_path, layout).await,
        Err(e) => Err(e.into()),
    };
    live.close().await;
    result
}

async fn copy_from_source(
    live: &SqlitePool,
    source: &SqlitePool,
    requested: Option<SourceLayout>,
) -> Result<CopyReport, CopyError> {
    let layout = match requested {
        Some(layout) => layout,
        None => detect_layout(source).await?,
    };
    tracing::info!("Using backup layout '{}' (v{})", layout.name, layout.version);

    // Everything is read and checked before the live database is touched
    let mut plans = Vec::with_capacity(layout.tables.len());
    for table in &layout.tables {
        plans.push(plan_table(source, table).await?);
    }
    let replaced: Vec<CopyStep> = layout
        .tables
        .iter()
        .zip(&plans)
        .filter(|(_, plan)| matches!(plan, StepPlan::Copy(_)))
        .map(|(table, _)| table.step)
        .collect();

    let mut tx = live.begin().await?;
    sqlx::query("PRAGMA defer_foreign_keys = ON")
        .execute(&mut *tx)
        .await?;

    // Cascades still fire with deferred checks; rows of steps that do not
    // run are set aside before their parents are replaced.
    let mut kept = Vec::new();
    for (table, plan) in layout.tables.iter().zip(&plans) {
        if matches!(plan, StepPlan::Copy(_)) {
            continue;
        }
        if table.step.parents().iter().any(|p| replaced.contains(p)) {
            keep_live_rows(&mut tx, table).await?;
            kept.push(table);
        }
    }

    let mut report = CopyReport {
        layout: layout.name,
        steps: Vec::with_capacity(layout.tables.len()),
    };
    for (table, plan) in layout.tables.iter().zip(plans) {
        tracing::info!("Copying {}...", table.step);
        let outcome = match plan {
            StepPlan::Copy(rows) => StepOutcome::Copied(replace_rows(&mut tx, table, &rows).await?),
            StepPlan::Skip(reason) => StepOutcome::Skipped(reason),
            StepPlan::Fail(reason) => StepOutcome::Failed(reason),
        };
        match &outcome {
            StepOutcome::Copied(n) => tracing::info!("Copied {} {}", n, table.step),
            StepOutcome::Skipped(reason) => tracing::warn!("{}", reason),
            StepOutcome::Failed(reason) => tracing::error!("{}", reason),
        }
        report.steps.push(StepReport {
            step: table.step,
            source_table: table.source_table.to_string(),
            outcome,
        });
    }

    for table in kept {
        restore_live_rows(&mut tx, table).await?;
    }

    // Keep the gender invariant for rows written by older versions
    sqlx::query("UPDATE words SET has_gender = 0 WHERE gender = 'N' AND has_gender != 0")
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE words SET has_gender = 1 WHERE gender != 'N' AND has_gender = 0")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!("Data successfully copied from backup to live database");
    Ok(report)
}

async fn detect_layout(source: &SqlitePool) -> Result<SourceLayout, CopyError> {
    for layout in LAYOUTS {
        if table_exists(source, layout.words_table()).await? {
            return Ok(layout);
        }
    }
    Err(CopyError::NoMatchingLayout)
}

/// What a step will do, decided from the backup alone
enum StepPlan {
    Copy(Vec<SqliteRow>),
    Skip(String),
    Fail(String),
}

async fn plan_table(source: &SqlitePool, table: &TableMapping) -> Result<StepPlan, CopyError> {
    if !table_exists(source, table.source_table).await? {
        return Ok(StepPlan::Skip(format!(
            "No {} table ({}) found in backup",
            table.step, table.source_table
        )));
    }

    let present = table_columns(source, table.source_table).await?;
    let missing: Vec<String> = table
        .columns
        .iter()
        .filter(|c| !present.iter().any(|p| p == c.source))
        .map(|c| c.source.to_string())
        .collect();
    if !missing.is_empty() {
        if table.step.is_link() {
            return Ok(StepPlan::Fail(format!(
                "Could not copy {}: {} is missing columns {}. Columns found: {}",
                table.step,
                table.source_table,
                missing.join(", "),
                present.join(", ")
            )));
        }
        return Err(CopyError::MissingColumns {
            table: table.source_table.to_string(),
            columns: missing,
        });
    }

    let rows = sqlx::query(&select_sql(table)).fetch_all(source).await?;
    Ok(StepPlan::Copy(rows))
}

fn kept_table(table: &TableMapping) -> String {
    format!("temp.kept_{}", table.dest_table)
}

async fn keep_live_rows(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    table: &TableMapping,
) -> Result<(), CopyError> {
    let kept = kept_table(table);
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", kept))
        .execute(&mut **tx)
        .await?;
    sqlx::query(&format!("CREATE TABLE {} AS SELECT * FROM {}", kept, table.dest_table))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Put back the set-aside rows whose parents still exist
async fn restore_live_rows(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    table: &TableMapping,
) -> Result<(), CopyError> {
    let kept = kept_table(table);
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", kept))
        .fetch_one(&mut **tx)
        .await?;
    let restored = sqlx::query(&format!(
        "INSERT OR IGNORE INTO {} SELECT * FROM {} WHERE {}",
        table.dest_table,
        kept,
        table.step.parent_filter()
    ))
    .execute(&mut **tx)
    .await?
    .rows_affected();
    sqlx::query(&format!("DROP TABLE {}", kept))
        .execute(&mut **tx)
        .await?;

    tracing::info!("Kept {} live {}", restored, table.step);
    let orphaned = (total as u64).saturating_sub(restored);
    if orphaned > 0 {
        tracing::warn!(
            "Dropped {} live {} whose parent rows are not in the backup",
            orphaned,
            table.step
        );
    }
    Ok(())
}

/// Value read from the backup, ready to bind
enum Value {
    Integer(Option<i64>),
    Text(Option<String>),
    Timestamp(DateTime<Utc>),
}

async fn replace_rows(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    table: &TableMapping,
    rows: &[SqliteRow],
) -> Result<u64, CopyError> {
    sqlx::query(&format!("DELETE FROM {}", table.dest_table))
        .execute(&mut **tx)
        .await?;

    let insert = insert_sql(table);
    let now = Utc::now();
    for row in rows {
        insert_row(&mut **tx, &insert, table, row, now).await?;
    }

    Ok(rows.len() as u64)
}

/// SELECT with every value cast to the storage class the mapping expects
fn select_sql(table: &TableMapping) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| match c.kind {
            ColumnKind::Integer => format!("CAST(\"{0}\" AS INTEGER) AS \"{0}\"", c.source),
            ColumnKind::Text | ColumnKind::Timestamp => {
                format!("CAST(\"{0}\" AS TEXT) AS \"{0}\"", c.source)
            }
        })
        .collect();
    format!(
        "SELECT {} FROM \"{}\" ORDER BY rowid",
        columns.join(", "),
        table.source_table
    )
}

fn insert_sql(table: &TableMapping) -> String {
    let columns: Vec<&str> = table.columns.iter().map(|c| c.dest).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.dest_table,
        columns.join(", "),
        placeholders
    )
}

async fn insert_row(
    conn: &mut SqliteConnection,
    sql: &str,
    table: &TableMapping,
    row: &SqliteRow,
    now: DateTime<Utc>,
) -> Result<(), CopyError> {
    let mut values = Vec::with_capacity(table.columns.len());
    for column in table.columns {
        let value = match column.kind {
            ColumnKind::Integer => Value::Integer(row.try_get(column.source)?),
            ColumnKind::Text => Value::Text(row.try_get(column.source)?),
            ColumnKind::Timestamp => {
                let raw: Option<String> = row.try_get(column.source)?;
                Value::Timestamp(raw.as_deref().and_then(parse_timestamp).unwrap_or(now))
            }
        };
        values.push(value);
    }

    let mut query = sqlx::query(sql);
    for value in values {
        query = match value {
            Value::Integer(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
            Value::Timestamp(v) => query.bind(v),
        };
    }
    query.execute(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    const DJANGO_SCHEMA: &str = r#"
        CREATE TABLE temario_thematiccategory (id INTEGER PRIMARY KEY, name VARCHAR(100) NOT NULL UNIQUE, description TEXT NULL);
        CREATE TABLE temario_word (id INTEGER PRIMARY KEY, text VARCHAR(100) NOT NULL, definition TEXT NOT NULL,
            gender VARCHAR(1) NOT NULL, has_gender BOOL NOT NULL, created_at DATETIME NOT NULL, updated_at DATETIME NOT NULL);
        CREATE TABLE temario_word_thematic_categories (id INTEGER PRIMARY KEY, word_id INTEGER NOT NULL, thematiccategory_id INTEGER NOT NULL);
        CREATE TABLE temario_examplesentence (id INTEGER PRIMARY KEY, word_id INTEGER NOT NULL, text TEXT NOT NULL,
            translation TEXT NULL, created_at DATETIME NOT NULL);
    "#;

    async fn run_script(pool: &SqlitePool, script: &str) {
        for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(pool).await.unwrap();
        }
    }

    async fn writable(path: &Path) -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().filename(path).create_if_missing(true))
            .await
            .unwrap()
    }

    /// Backup with 5 categories, 100 words, 20 links and 300 sentences; ids
    /// start at 101 so preservation is observable.
    async fn build_backup(path: &Path) {
        let pool = writable(path).await;
        run_script(&pool, DJANGO_SCHEMA).await;

        for i in 0..5 {
            sqlx::query("INSERT INTO temario_thematiccategory (id, name, description) VALUES (?, ?, NULL)")
                .bind(101 + i)
                .bind(format!("Categoría {}", i))
                .execute(&pool)
                .await
                .unwrap();
        }
        for i in 0..100 {
            let gender = ["M", "F", "N"][i % 3];
            sqlx::query(
                "INSERT INTO temario_word (id, text, definition, gender, has_gender, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, '2023-01-02 03:04:05.678900', '2023-01-02 03:04:05')",
            )
            .bind(101 + i as i64)
            .bind(format!("palabra{}", i))
            .bind(format!("word {}", i))
            .bind(gender)
            .bind(gender != "N")
            .execute(&pool)
            .await
            .unwrap();
        }
        for i in 0..20i64 {
            sqlx::query("INSERT INTO temario_word_thematic_categories (word_id, thematiccategory_id) VALUES (?, ?)")
                .bind(101 + i)
                .bind(101 + i % 5)
                .execute(&pool)
                .await
                .unwrap();
        }
        for i in 0..300i64 {
            sqlx::query(
                "INSERT INTO temario_examplesentence (id, word_id, text, translation, created_at) \
                 VALUES (?, ?, ?, NULL, '2023-02-03 04:05:06')",
            )
            .bind(1001 + i)
            .bind(101 + i % 100)
            .bind(format!("Frase {}", i))
            .execute(&pool)
            .await
            .unwrap();
        }
        pool.close().await;
    }

    async fn live_db(dir: &Path) -> DynDatabasePool {
        let config = DatabaseConfig {
            url: dir.join("live.db").to_string_lossy().into_owned(),
        };
        let pool = create_pool(&config).await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn count(pool: &DynDatabasePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool.sqlite())
            .await
            .unwrap()
    }

    #[test]
    fn test_layouts_are_declared() {
        assert_eq!(find_layout("django-blog").unwrap().words_table(), "blog_word");
        assert_eq!(
            find_layout("django-temario").unwrap().tables[2].columns[1].source,
            "thematiccategory_id"
        );
        assert!(find_layout("blog").is_none());
    }

    #[tokio::test]
    async fn test_copy_preserves_counts_and_ids() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("db.sqlite3.backup");
        build_backup(&backup).await;
        let live = live_db(dir.path()).await;

        // pre-existing live rows are replaced
        sqlx::query("INSERT INTO thematic_categories (id, name) VALUES (1, 'Vieja')")
            .execute(live.sqlite())
            .await
            .unwrap();
        sqlx::query("INSERT INTO words (id, text, definition) VALUES (1, 'viejo', 'old')")
            .execute(live.sqlite())
            .await
            .unwrap();

        let report = copy_backup(&live, &backup, None).await.unwrap();
        assert_eq!(report.layout, "django-temario");
        assert!(!report.has_failures());
        assert_eq!(report.copied(CopyStep::ThematicCategories), Some(5));
        assert_eq!(report.copied(CopyStep::Words), Some(100));
        assert_eq!(report.copied(CopyStep::WordCategories), Some(20));
        assert_eq!(report.copied(CopyStep::ExampleSentences), Some(300));

        assert_eq!(count(&live, "thematic_categories").await, 5);
        assert_eq!(count(&live, "words").await, 100);
        assert_eq!(count(&live, "word_thematic_categories").await, 20);
        assert_eq!(count(&live, "example_sentences").await, 300);

        let (min, max): (i64, i64) = sqlx::query_as("SELECT MIN(id), MAX(id) FROM words")
            .fetch_one(live.sqlite())
            .await
            .unwrap();
        assert_eq!((min, max), (101, 200));
        let example_ids: (i64, i64) = sqlx::query_as("SELECT MIN(id), MAX(id) FROM example_sentences")
            .fetch_one(live.sqlite())
            .await
            .unwrap();
        assert_eq!(example_ids, (1001, 1300));

        let created: DateTime<Utc> = sqlx::query_scalar("SELECT created_at FROM words WHERE id = 101")
            .fetch_one(live.sqlite())
            .await
            .unwrap();
        assert_eq!(created.to_rfc3339(), "2023-01-02T03:04:05.678900+00:00");

        live.close().await;
    }

    #[tokio::test]
    async fn test_missing_backup_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let live = live_db(dir.path()).await;
        sqlx::query("INSERT INTO thematic_categories (id, name) VALUES (1, 'Comida')")
            .execute(live.sqlite())
            .await
            .unwrap();

        let result = copy_backup(&live, &dir.path().join("nope.sqlite3"), None).await;
        assert!(matches!(result, Err(CopyError::BackupNotFound(_))));
        assert_eq!(count(&live, "thematic_categories").await, 1);
        live.close().await;
    }

    #[tokio::test]
    async fn test_missing_backup_leaves_live_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let live_path = dir.path().join("live.db");
        let config = DatabaseConfig {
            url: live_path.to_string_lossy().into_owned(),
        };

        let result = copy_into_database(&config, &dir.path().join("nope.sqlite3"), None).await;
        assert!(matches!(result, Err(CopyError::BackupNotFound(_))));
        assert!(!live_path.exists());

        let backup = dir.path().join("backup.sqlite3");
        build_backup(&backup).await;
        let result = copy_into_database(&config, &backup, Some("blog")).await;
        assert!(matches!(result, Err(CopyError::UnknownLayout(_))));
        assert!(!live_path.exists());

        let report = copy_into_database(&config, &backup, None).await.unwrap();
        assert_eq!(report.copied(CopyStep::Words), Some(100));
        assert!(live_path.exists());
    }

    #[tokio::test]
    async fn test_missing_link_columns_fail_only_that_step() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup.sqlite3");
        {
            let pool = writable(&backup).await;
            run_script(
                &pool,
                "CREATE TABLE thematic_categories (id INTEGER PRIMARY KEY, name TEXT, description TEXT);
                 CREATE TABLE words (id INTEGER PRIMARY KEY, text TEXT, definition TEXT, gender TEXT,
                     has_gender INTEGER, created_at TEXT, updated_at TEXT);
                 CREATE TABLE word_thematic_categories (word INTEGER, category INTEGER);
                 INSERT INTO thematic_categories VALUES (3, 'Ropa', NULL);
                 INSERT INTO words VALUES (7, 'camisa', 'shirt', 'F', 1, 'bad date', NULL);",
            )
            .await;
            pool.close().await;
        }
        let live = live_db(dir.path()).await;

        let report = copy_backup(&live, &backup, Some("native")).await.unwrap();
        assert_eq!(report.copied(CopyStep::ThematicCategories), Some(1));
        assert_eq!(report.copied(CopyStep::Words), Some(1));
        assert!(matches!(report.steps[2].outcome, StepOutcome::Failed(_)));
        assert!(matches!(report.steps[3].outcome, StepOutcome::Skipped(_)));
        assert!(report.has_failures());
        assert_eq!(count(&live, "words").await, 1);
        live.close().await;
    }

    #[tokio::test]
    async fn test_skipped_examples_keep_live_rows() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup.sqlite3");
        {
            let pool = writable(&backup).await;
            run_script(
                &pool,
                "CREATE TABLE thematic_categories (id INTEGER PRIMARY KEY, name TEXT, description TEXT);
                 CREATE TABLE words (id INTEGER PRIMARY KEY, text TEXT, definition TEXT, gender TEXT,
                     has_gender INTEGER, created_at TEXT, updated_at TEXT);
                 CREATE TABLE word_thematic_categories (word_id INTEGER, category_id INTEGER);
                 INSERT INTO thematic_categories VALUES (3, 'Ropa', NULL);
                 INSERT INTO words VALUES (1, 'camisa', 'shirt', 'F', 1, NULL, NULL);
                 INSERT INTO word_thematic_categories VALUES (1, 3);",
            )
            .await;
            pool.close().await;
        }
        let live = live_db(dir.path()).await;
        run_script(
            live.sqlite(),
            "INSERT INTO words (id, text, definition) VALUES (1, 'vieja', 'old'), (2, 'perdida', 'lost');
             INSERT INTO example_sentences (id, word_id, text) VALUES (1, 1, 'La camisa es azul.'), (2, 2, 'Adiós.')",
        )
        .await;

        let report = copy_backup(&live, &backup, Some("native")).await.unwrap();
        assert_eq!(report.copied(CopyStep::Words), Some(1));
        assert_eq!(report.copied(CopyStep::WordCategories), Some(1));
        assert!(matches!(report.steps[3].outcome, StepOutcome::Skipped(_)));

        // word 2 is gone, so only the sentence of word 1 survives
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM example_sentences ORDER BY id")
            .fetch_all(live.sqlite())
            .await
            .unwrap();
        assert_eq!(ids, vec![1]);
        let text: String = sqlx::query_scalar("SELECT text FROM words WHERE id = 1")
            .fetch_one(live.sqlite())
            .await
            .unwrap();
        assert_eq!(text, "camisa");
        live.close().await;
    }

    #[tokio::test]
    async fn test_missing_entity_columns_roll_back() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup.sqlite3");
        {
            let pool = writable(&backup).await;
            run_script(
                &pool,
                "CREATE TABLE blog_thematiccategory (id INTEGER PRIMARY KEY, name TEXT, description TEXT);
                 CREATE TABLE blog_word (id INTEGER PRIMARY KEY, text TEXT);
                 INSERT INTO blog_thematiccategory VALUES (3, 'Ropa', NULL);",
            )
            .await;
            pool.close().await;
        }
        let live = live_db(dir.path()).await;
        sqlx::query("INSERT INTO thematic_categories (id, name) VALUES (1, 'Comida')")
            .execute(live.sqlite())
            .await
            .unwrap();

        let result = copy_backup(&live, &backup, None).await;
        assert!(matches!(result, Err(CopyError::MissingColumns { .. })));

        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM thematic_categories")
            .fetch_all(live.sqlite())
            .await
            .unwrap();
        assert_eq!(names, vec!["Comida"]);
        live.close().await;
    }

    #[tokio::test]
    async fn test_unknown_layout() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup.sqlite3");
        writable(&backup).await.close().await;
        let live = live_db(dir.path()).await;

        assert!(matches!(
            copy_backup(&live, &backup, Some("mysql")).await,
            Err(CopyError::UnknownLayout(_))
        ));
        assert!(matches!(
            copy_backup(&live, &backup, None).await,
            Err(CopyError::NoMatchingLayout)
        ));
        live.close().await;
    }
}
