//! User service
//!
//! Registration, login/logout, session validation and profile edits.
//! The very first registered account becomes the superuser.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{
    CreateUserInput, ListParams, PagedResult, Session, UpdateUserInput, User, UserRole,
    NICKNAME_MAX_LEN,
};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Default session lifetime in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days: DEFAULT_SESSION_EXPIRATION_DAYS,
        }
    }

    pub fn with_session_expiration(mut self, days: i64) -> Self {
        self.session_expiration_days = days;
        self
    }

    /// Register a new account.
    ///
    /// The role is superuser when no user exists yet, otherwise the requested
    /// role or member.
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();

        if username.is_empty() {
            return Err(UserServiceError::ValidationError("Username cannot be empty".to_string()));
        }
        if email.is_empty() {
            return Err(UserServiceError::ValidationError("Email cannot be empty".to_string()));
        }
        if !email.contains('@') {
            return Err(UserServiceError::ValidationError("Invalid email format".to_string()));
        }
        if input.password.is_empty() {
            return Err(UserServiceError::ValidationError("Password cannot be empty".to_string()));
        }
        let nickname = validate_nickname(input.nickname)?;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }
        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Superuser
        } else {
            input.role.unwrap_or_default()
        };

        let password_hash = hash_password(&input.password)?;
        let mut user = User::new(username, email, password_hash, role);
        user.nickname = nickname;

        let created = self.user_repo.create(&user).await?;
        tracing::info!("Registered user '{}' as {}", created.username, created.role);
        Ok(created)
    }

    /// Check credentials and open a session. Username or email are accepted.
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<Session, UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = match self.user_repo.get_by_username(username_or_email).await? {
            Some(user) => user,
            None => self
                .user_repo
                .get_by_email(username_or_email)
                .await?
                .ok_or_else(invalid)?,
        };

        if !verify_password(password, &user.password_hash)? {
            tracing::warn!("Failed login for '{}'", user.username);
            return Err(invalid());
        }
        if !user.is_active {
            return Err(UserServiceError::AuthenticationError(
                "This account is inactive".to_string(),
            ));
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + Duration::days(self.session_expiration_days),
            created_at: now,
        };
        Ok(self.session_repo.create(&session).await?)
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// User behind a session token, if the session exists, has not expired at
    /// `now` and belongs to an active account. Expired sessions are removed.
    pub async fn validate_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self.session_repo.get_by_id(token).await? else {
            return Ok(None);
        };

        if session.is_expired_at(now) {
            self.session_repo.delete(token).await?;
            return Ok(None);
        }

        let user = self.user_repo.get_by_id(session.user_id).await?;
        Ok(user.filter(|u| u.is_active))
    }

    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        Ok(self.user_repo.count().await? == 0)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await?)
    }

    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<User>, UserServiceError> {
        let total = self.user_repo.count().await?;
        let params = params.clamp_to(total);
        let users = self.user_repo.list(&params).await?;
        Ok(PagedResult::new(users, total, &params))
    }

    /// Profile edit by the account owner: nickname and email only.
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateUserInput,
    ) -> Result<User, UserServiceError> {
        let input = UpdateUserInput {
            role: None,
            is_active: None,
            ..input
        };
        self.update(user_id, input).await
    }

    /// Administrative edit; may also change role and active flag.
    pub async fn update(
        &self,
        user_id: i64,
        input: UpdateUserInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(UserServiceError::NotFound)?;

        if !input.has_changes() {
            return Ok(user);
        }

        if let Some(email) = input.email {
            let email = email.trim().to_string();
            if email.is_empty() || !email.contains('@') {
                return Err(UserServiceError::ValidationError("Invalid email format".to_string()));
            }
            if let Some(existing) = self.user_repo.get_by_email(&email).await? {
                if existing.id != user.id {
                    return Err(UserServiceError::UserExists(format!(
                        "Email '{}' is already registered",
                        email
                    )));
                }
            }
            user.email = email;
        }
        if let Some(nickname) = input.nickname {
            user.nickname = validate_nickname(nickname)?;
        }
        if let Some(role) = input.role {
            user.role = role;
        }
        if let Some(is_active) = input.is_active {
            user.is_active = is_active;
        }

        Ok(self.user_repo.update(&user).await?)
    }

    pub async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, UserServiceError> {
        Ok(self.session_repo.delete_expired(now).await?)
    }
}

/// Trim a nickname, turn blanks into `None` and enforce the length limit.
fn validate_nickname(nickname: Option<String>) -> Result<Option<String>, UserServiceError> {
    let Some(nickname) = nickname.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if nickname.chars().count() > NICKNAME_MAX_LEN {
        return Err(UserServiceError::ValidationError(format!(
            "Nickname cannot be longer than {} characters",
            NICKNAME_MAX_LEN
        )));
    }
    Ok(Some(nickname))
}
