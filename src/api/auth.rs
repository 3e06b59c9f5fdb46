//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /api/v1/auth/register - Registration (the first account is a superuser)
//! - POST /api/v1/auth/login - Login by username or email
//! - POST /api/v1/auth/logout - Logout
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/profile - Update own email and nickname

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::double_option;
use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateUserInput, Session, UpdateUserInput, User};

/// Request body for user registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub nickname: Option<String>,
}

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// Request body for profile updates; `nickname: null` clears it
#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub nickname: Option<Option<String>>,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

/// Response for user info
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub nickname: Option<String>,
    pub display_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            display_name: user.display_name().to_string(),
            id: user.id,
            username: user.username,
            email: user.email,
            nickname: user.nickname,
            role: user.role.to_string(),
            is_active: user.is_active,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
}

fn session_cookie(session: &Session) -> Result<HeaderMap, ApiError> {
    let max_age = (session.expires_at - session.created_at).num_seconds().max(0);
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id, max_age
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|e| ApiError::internal_error(e.to_string()))?,
    );
    Ok(headers)
}

/// POST /api/v1/auth/register - User registration
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let password = body.password.clone();
    let user = state
        .user_service
        .register(CreateUserInput {
            username: body.username,
            email: body.email,
            password: body.password,
            nickname: body.nickname,
            role: None,
        })
        .await?;

    let session = state.user_service.login(&user.username, &password).await?;
    let headers = session_cookie(&session)?;

    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login - User login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .user_service
        .login(&body.username_or_email, &body.password)
        .await?;
    let user = state
        .user_service
        .get_by_id(session.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    let headers = session_cookie(&session)?;

    Ok((
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/logout - Delete the current session
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/v1/auth/me - Get current user
async fn get_current_user(
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Json<UserResponse> {
    Json(user.into())
}

/// PUT /api/v1/auth/profile - Update own email and nickname
async fn update_profile(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Json(body): Json<ProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state
        .user_service
        .update_profile(
            user.id,
            UpdateUserInput {
                email: body.email,
                nickname: body.nickname,
                ..Default::default()
            },
        )
        .await?;
    Ok(Json(updated.into()))
}
