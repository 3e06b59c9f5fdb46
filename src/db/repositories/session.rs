//! Session repository
//!
//! Sessions are removed on logout, on expiry and when their user row is
//! deleted (cascade).

use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID (token)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions for a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Delete sessions that expired before `now`; returns how many
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        create_session_sqlite(self.pool.sqlite(), session).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        get_session_by_id_sqlite(self.pool.sqlite(), id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete user sessions")?;
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(now)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete expired sessions")?;
        Ok(result.rows_affected())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(session.user_id)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(session.clone())
}

async fn get_session_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, expires_at, created_at
        FROM sessions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use chrono::Duration;

    async fn setup() -> (SqlxSessionRepository, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let users = SqlxUserRepository::new(pool.clone());
        let user = users
            .create(&User::new(
                "eva".to_string(),
                "eva@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();
        (SqlxSessionRepository::new(pool), user.id)
    }

    fn session(id: &str, user_id: i64, expires_at: DateTime<Utc>) -> Session {
        Session {
            id: id.to_string(),
            user_id,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let (repo, user_id) = setup().await;
        let s = session("token-1", user_id, Utc::now() + Duration::days(7));
        repo.create(&s).await.unwrap();

        let found = repo.get_by_id("token-1").await.unwrap().unwrap();
        assert_eq!(found.user_id, user_id);

        repo.delete("token-1").await.unwrap();
        assert!(repo.get_by_id("token-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (repo, user_id) = setup().await;
        let now = Utc::now();
        repo.create(&session("old", user_id, now - Duration::hours(1)))
            .await
            .unwrap();
        repo.create(&session("fresh", user_id, now + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(repo.delete_expired(now).await.unwrap(), 1);
        assert!(repo.get_by_id("fresh").await.unwrap().is_some());

        repo.delete_by_user(user_id).await.unwrap();
        assert!(repo.get_by_id("fresh").await.unwrap().is_none());
    }
}
