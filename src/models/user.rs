//! User model
//!
//! The site's custom user: the usual identity fields plus an optional display
//! nickname.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum nickname length in characters
pub const NICKNAME_MAX_LEN: usize = 50;

/// Registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Optional display name shown instead of the username
    pub nickname: Option<String>,
    /// Permission level
    pub role: UserRole,
    /// Inactive users cannot log in
    pub is_active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a user that has not been stored yet. The password must already
    /// be hashed with `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            nickname: None,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Nickname when set and non-blank, username otherwise.
    pub fn display_name(&self) -> &str {
        match self.nickname.as_deref().map(str::trim) {
            Some(nickname) if !nickname.is_empty() => nickname,
            _ => &self.username,
        }
    }

    /// Superusers and staff may use the admin endpoints
    pub fn is_staff(&self) -> bool {
        matches!(self.role, UserRole::Superuser | UserRole::Staff)
    }

    pub fn is_superuser(&self) -> bool {
        self.role == UserRole::Superuser
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access, including user management
    Superuser,
    /// Content administration
    Staff,
    /// Regular site account
    #[default]
    Member,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Superuser => "superuser",
            UserRole::Staff => "staff",
            UserRole::Member => "member",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "superuser" => Ok(UserRole::Superuser),
            "staff" => Ok(UserRole::Staff),
            "member" => Ok(UserRole::Member),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    pub nickname: Option<String>,
    /// Defaults to member, or superuser for the very first account
    pub role: Option<UserRole>,
}

/// Input for updating a user. `None` leaves a field untouched; a nickname of
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserInput {
    pub email: Option<String>,
    pub nickname: Option<Option<String>>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

impl UpdateUserInput {
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_nickname(mut self, nickname: Option<String>) -> Self {
        self.nickname = Some(nickname);
        self
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn has_changes(&self) -> bool {
        self.email.is_some()
            || self.nickname.is_some()
            || self.role.is_some()
            || self.is_active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(nickname: Option<&str>) -> User {
        User {
            id: 1,
            username: "ana".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: String::new(),
            nickname: nickname.map(str::to_string),
            role: UserRole::Member,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_prefers_nickname() {
        assert_eq!(user(Some("Anita")).display_name(), "Anita");
        assert_eq!(user(Some("Anita")).to_string(), "Anita");
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        assert_eq!(user(None).display_name(), "ana");
        assert_eq!(user(Some("   ")).display_name(), "ana");
    }

    #[test]
    fn test_role_roundtrip() {
        for role in [UserRole::Superuser, UserRole::Staff, UserRole::Member] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
        assert!("admin".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_staff_checks() {
        let mut u = user(None);
        assert!(!u.is_staff());
        u.role = UserRole::Staff;
        assert!(u.is_staff());
        assert!(!u.is_superuser());
        u.role = UserRole::Superuser;
        assert!(u.is_staff() && u.is_superuser());
    }

    #[test]
    fn test_update_input_has_changes() {
        assert!(!UpdateUserInput::default().has_changes());
        assert!(UpdateUserInput::default().with_nickname(None).has_changes());
    }
}
