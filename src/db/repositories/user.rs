//! User repository
//!
//! Users are never hard-deleted by the application; deactivation goes through
//! `update`. Deleting a row directly cascades to sessions and posts.

use crate::db::DynDatabasePool;
use crate::models::{ListParams, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. `created_at`/`updated_at` are set to now.
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Superuser with the lowest id, if any
    async fn first_superuser(&self) -> Result<Option<User>>;

    /// Persist email, nickname, role and active flag. Bumps `updated_at`.
    async fn update(&self, user: &User) -> Result<User>;

    async fn count(&self) -> Result<i64>;

    /// Users ordered by id
    async fn list(&self, params: &ListParams) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        create_user_sqlite(self.pool.sqlite(), user).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        get_user_where_sqlite(self.pool.sqlite(), "id = ?", Bind::Int(id)).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        get_user_where_sqlite(self.pool.sqlite(), "username = ?", Bind::Text(username)).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        get_user_where_sqlite(self.pool.sqlite(), "LOWER(email) = LOWER(?)", Bind::Text(email))
            .await
    }

    async fn first_superuser(&self) -> Result<Option<User>> {
        get_user_where_sqlite(
            self.pool.sqlite(),
            "role = ? ORDER BY id ASC LIMIT 1",
            Bind::Text(UserRole::Superuser.as_str()),
        )
        .await
    }

    async fn update(&self, user: &User) -> Result<User> {
        update_user_sqlite(self.pool.sqlite(), user).await
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count users")?;
        Ok(count)
    }

    async fn list(&self, params: &ListParams) -> Result<Vec<User>> {
        list_users_sqlite(self.pool.sqlite(), params).await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const USER_COLUMNS: &str =
    "id, username, email, password_hash, nickname, role, is_active, created_at, updated_at";

enum Bind<'a> {
    Int(i64),
    Text(&'a str),
}

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, nickname, role, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.nickname)
    .bind(user.role.as_str())
    .bind(user.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_where_sqlite(
    pool: &SqlitePool,
    condition: &str,
    value: Bind<'_>,
) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
    let query = sqlx::query(&sql);
    let query = match value {
        Bind::Int(v) => query.bind(v),
        Bind::Text(v) => query.bind(v),
    };

    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, nickname = ?, role = ?, is_active = ?, password_hash = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.nickname)
    .bind(user.role.as_str())
    .bind(user.is_active)
    .bind(&user.password_hash)
    .bind(now)
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    Ok(User {
        updated_at: now,
        ..user.clone()
    })
}

async fn list_users_sqlite(pool: &SqlitePool, params: &ListParams) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users ORDER BY id ASC LIMIT ? OFFSET ?",
        USER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        nickname: row.get("nickname"),
        role,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn test_user(username: &str, role: UserRole) -> User {
        User::new(
            username.to_string(),
            format!("{}@example.com", username),
            "not-a-real-hash".to_string(),
            role,
        )
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = setup_test_repo().await;
        let created = repo.create(&test_user("lucia", UserRole::Member)).await.unwrap();
        assert!(created.id > 0);

        let by_name = repo.get_by_username("lucia").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);

        let by_email = repo.get_by_email("LUCIA@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);

        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_nickname_and_role() {
        let repo = setup_test_repo().await;
        let mut user = repo.create(&test_user("pablo", UserRole::Member)).await.unwrap();

        user.nickname = Some("Pablito".to_string());
        user.role = UserRole::Staff;
        repo.update(&user).await.unwrap();

        let stored = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.nickname.as_deref(), Some("Pablito"));
        assert_eq!(stored.display_name(), "Pablito");
        assert_eq!(stored.role, UserRole::Staff);
    }

    #[tokio::test]
    async fn test_first_superuser_is_lowest_id() {
        let repo = setup_test_repo().await;
        assert!(repo.first_superuser().await.unwrap().is_none());

        repo.create(&test_user("member", UserRole::Member)).await.unwrap();
        let first = repo.create(&test_user("root", UserRole::Superuser)).await.unwrap();
        repo.create(&test_user("root2", UserRole::Superuser)).await.unwrap();

        let found = repo.first_superuser().await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let repo = setup_test_repo().await;
        for name in ["a", "b", "c"] {
            repo.create(&test_user(name, UserRole::Member)).await.unwrap();
        }
        assert_eq!(repo.count().await.unwrap(), 3);

        let page = repo.list(&ListParams::new(2, 2)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].username, "c");
    }
}
