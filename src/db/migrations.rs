//! Database migrations
//!
//! Schema changes are embedded as SQL strings and applied in version order.
//! Applied versions are tracked in the `_migrations` table.
//!
//! Cascade rules live in the schema itself:
//! - deleting a user deletes their sessions and posts
//! - deleting a post deletes its audio clips
//! - deleting a word deletes its example sentences and category links
//! - deleting a category deletes its word links (never the words)
//! - deleting a difficulty level deletes its readers

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use super::DynDatabasePool;

/// A versioned schema migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique, ascending)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements, separated by `;`
    pub up: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                email VARCHAR(254) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                nickname VARCHAR(50),
                role VARCHAR(20) NOT NULL DEFAULT 'member',
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_posts",
        up: r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(200) NOT NULL UNIQUE,
                subtitle VARCHAR(300),
                excerpt TEXT,
                content TEXT NOT NULL,
                image VARCHAR(255),
                audio_file VARCHAR(255),
                audio_duration VARCHAR(10),
                is_published BOOLEAN NOT NULL DEFAULT 0,
                published_date TIMESTAMP,
                reviewed BOOLEAN NOT NULL DEFAULT 0,
                review_notes TEXT,
                author_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_posts_published ON posts(is_published, published_date);
            CREATE INDEX IF NOT EXISTS idx_posts_author_id ON posts(author_id);
        "#,
    },
    Migration {
        version: 4,
        name: "create_post_audios",
        up: r#"
            CREATE TABLE IF NOT EXISTS post_audios (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL,
                title VARCHAR(200) NOT NULL,
                audio_file VARCHAR(255) NOT NULL,
                duration VARCHAR(10),
                description TEXT,
                display_order INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_post_audios_post_id ON post_audios(post_id, display_order);
        "#,
    },
    Migration {
        version: 5,
        name: "create_vocabulary",
        up: r#"
            CREATE TABLE IF NOT EXISTS thematic_categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE,
                description TEXT
            );
            CREATE TABLE IF NOT EXISTS words (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text VARCHAR(100) NOT NULL,
                definition TEXT NOT NULL,
                gender VARCHAR(1) NOT NULL DEFAULT 'N',
                has_gender BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_words_text ON words(text);
            CREATE TABLE IF NOT EXISTS word_thematic_categories (
                word_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                PRIMARY KEY (word_id, category_id),
                FOREIGN KEY (word_id) REFERENCES words(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES thematic_categories(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_word_categories_category ON word_thematic_categories(category_id);
            CREATE TABLE IF NOT EXISTS example_sentences (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                word_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                translation TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (word_id) REFERENCES words(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_example_sentences_word_id ON example_sentences(word_id);
        "#,
    },
    Migration {
        version: 6,
        name: "create_readers",
        up: r#"
            CREATE TABLE IF NOT EXISTS difficulty_levels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(50) NOT NULL,
                level_number INTEGER NOT NULL UNIQUE CHECK (level_number > 0),
                description TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE IF NOT EXISTS readers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(200) NOT NULL,
                author VARCHAR(100) NOT NULL,
                difficulty_level_id INTEGER NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                publication_date DATE NOT NULL,
                cover_image VARCHAR(255),
                word_count INTEGER NOT NULL DEFAULT 0 CHECK (word_count >= 0),
                vocabulary_focus TEXT NOT NULL DEFAULT '',
                grammar_focus TEXT NOT NULL DEFAULT '',
                FOREIGN KEY (difficulty_level_id) REFERENCES difficulty_levels(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_readers_level ON readers(difficulty_level_id);
        "#,
    },
];

/// Run all pending migrations.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    let sqlite = pool.sqlite();
    create_migrations_table(sqlite).await?;

    let applied = get_applied_migrations(sqlite).await?;
    let applied_versions: Vec<i64> = applied.iter().map(|m| m.version).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&(migration.version as i64)) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(sqlite, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create _migrations table")?;
    Ok(())
}

async fn get_applied_migrations(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;

    for statement in split_sql_statements(migration.up) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed.starts_with("--")
    })
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool.sqlite()).await?;
    let applied = get_applied_migrations(pool.sqlite()).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

/// Check whether a table exists in the given SQLite database
pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(pool)
            .await
            .with_context(|| format!("Failed to look up table {}", table))?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_pending_count() {
        let pool = create_test_pool().await.unwrap();

        assert_eq!(pending_count(&pool).await.unwrap(), MIGRATIONS.len());
        assert!(!is_up_to_date(&pool).await.unwrap());

        run_migrations(&pool).await.unwrap();
        assert_eq!(pending_count(&pool).await.unwrap(), 0);
        assert!(is_up_to_date(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn test_all_tables_created() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        for table in [
            "users",
            "sessions",
            "posts",
            "post_audios",
            "thematic_categories",
            "words",
            "word_thematic_categories",
            "example_sentences",
            "difficulty_levels",
            "readers",
        ] {
            assert!(table_exists(pool.sqlite(), table).await.unwrap(), "{}", table);
        }
        assert!(!table_exists(pool.sqlite(), "blog_word").await.unwrap());
    }

    #[tokio::test]
    async fn test_word_delete_cascades_to_examples_and_links() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let db = pool.sqlite();

        sqlx::query("INSERT INTO thematic_categories (id, name) VALUES (1, 'Comida')")
            .execute(db)
            .await
            .unwrap();
        sqlx::query("INSERT INTO words (id, text, definition) VALUES (1, 'pan', 'bread')")
            .execute(db)
            .await
            .unwrap();
        sqlx::query("INSERT INTO word_thematic_categories (word_id, category_id) VALUES (1, 1)")
            .execute(db)
            .await
            .unwrap();
        sqlx::query("INSERT INTO example_sentences (word_id, text) VALUES (1, 'Compro pan.')")
            .execute(db)
            .await
            .unwrap();

        sqlx::query("DELETE FROM words WHERE id = 1")
            .execute(db)
            .await
            .unwrap();

        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM word_thematic_categories")
            .fetch_one(db)
            .await
            .unwrap();
        let examples: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM example_sentences")
            .fetch_one(db)
            .await
            .unwrap();
        let categories: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM thematic_categories")
            .fetch_one(db)
            .await
            .unwrap();
        assert_eq!(links, 0);
        assert_eq!(examples, 0);
        assert_eq!(categories, 1);
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INTEGER);\n-- comment only\n;\nCREATE INDEX i ON a(id);";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE"));
        assert!(statements[1].starts_with("CREATE INDEX"));
    }

    #[test]
    fn test_truncate_sql() {
        let long = "x".repeat(150);
        assert_eq!(truncate_sql(&long).len(), 103);
        assert_eq!(truncate_sql("SELECT 1"), "SELECT 1");
    }
}
