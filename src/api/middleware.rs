//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error type returned by every handler
//! - Authentication (session token validation)
//! - Authorization (staff and superuser checks)

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::MediaConfig;
use crate::db::repositories::{
    SqlxDifficultyLevelRepository, SqlxExampleSentenceRepository, SqlxPostAudioRepository,
    SqlxPostRepository, SqlxReaderRepository, SqlxSessionRepository,
    SqlxThematicCategoryRepository, SqlxUserRepository, SqlxWordRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    PostService, PostServiceError, ReaderService, ReaderServiceError, UserService,
    UserServiceError, VocabularyService, VocabularyServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub vocabulary_service: Arc<VocabularyService>,
    pub reader_service: Arc<ReaderService>,
    pub media: Arc<MediaConfig>,
}

impl AppState {
    /// Wire repositories and services over one pool and cache
    pub fn new(pool: DynDatabasePool, cache: Arc<Cache>, media: MediaConfig) -> Self {
        let user_service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
        );
        let post_service = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            SqlxPostAudioRepository::boxed(pool.clone()),
            media.url.clone(),
        );
        let vocabulary_service = VocabularyService::new(
            SqlxThematicCategoryRepository::boxed(pool.clone()),
            SqlxWordRepository::boxed(pool.clone()),
            SqlxExampleSentenceRepository::boxed(pool.clone()),
            cache.clone(),
        );
        let reader_service = ReaderService::new(
            SqlxDifficultyLevelRepository::boxed(pool.clone()),
            SqlxReaderRepository::boxed(pool.clone()),
            cache,
            media.url.clone(),
        );

        Self {
            pool,
            user_service: Arc::new(user_service),
            post_service: Arc::new(post_service),
            vocabulary_service: Arc::new(vocabulary_service),
            reader_service: Arc::new(reader_service),
            media: Arc::new(media),
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Log internal failures; clients only see a generic message.
fn internal(error: anyhow::Error) -> ApiError {
    tracing::error!("Internal error: {:#}", error);
    ApiError::internal_error("Internal server error")
}

impl From<PostServiceError> for ApiError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound(what) => ApiError::not_found(format!("Post not found: {}", what)),
            PostServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PostServiceError::DuplicateSlug(slug) => ApiError::with_details(
                "CONFLICT",
                format!("A post with slug '{}' already exists", slug),
                serde_json::json!({ "field": "slug" }),
            ),
            PostServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<VocabularyServiceError> for ApiError {
    fn from(e: VocabularyServiceError) -> Self {
        match e {
            VocabularyServiceError::NotFound(what) => ApiError::not_found(format!("Not found: {}", what)),
            VocabularyServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            VocabularyServiceError::Conflict(msg) => ApiError::conflict(msg),
            VocabularyServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<ReaderServiceError> for ApiError {
    fn from(e: ReaderServiceError) -> Self {
        match e {
            ReaderServiceError::NotFound(what) => ApiError::not_found(format!("Not found: {}", what)),
            ReaderServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ReaderServiceError::Conflict(msg) => ApiError::conflict(msg),
            ReaderServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::InternalError(e) => internal(e),
        }
    }
}

/// Extract session token from request
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token, Utc::now())
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

fn authenticated(request: &Request) -> Result<&User, ApiError> {
    request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| &u.0)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

/// Staff authorization middleware (staff or superuser)
pub async fn require_staff(request: Request, next: Next) -> Result<Response, ApiError> {
    if !authenticated(&request)?.is_staff() {
        return Err(ApiError::forbidden("Staff privileges required"));
    }
    Ok(next.run(request).await)
}

/// Superuser authorization middleware
pub async fn require_superuser(request: Request, next: Next) -> Result<Response, ApiError> {
    if !authenticated(&request)?.is_superuser() {
        return Err(ApiError::forbidden("Superuser privileges required"));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};

    fn create_request_with_auth(token: &str) -> Request<Body> {
        Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let request = create_request_with_auth("token-123");
        assert_eq!(extract_session_token(request.headers()), Some("token-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let request = Request::builder()
            .uri("/test")
            .header(header::COOKIE, "theme=dark; session=token-456")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_session_token(request.headers()), Some("token-456".to_string()));
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer bearer-token")
            .header(header::COOKIE, "session=cookie-token")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_session_token(request.headers()), Some("bearer-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_none() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        assert!(extract_session_token(request.headers()).is_none());

        let basic = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Basic abc")
            .body(Body::empty())
            .unwrap();
        assert!(extract_session_token(basic.headers()).is_none());
    }

    #[test]
    fn test_service_errors_map_to_status() {
        let err: ApiError = PostServiceError::DuplicateSlug("hola".to_string()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.error.details.unwrap()["field"], "slug");

        let err: ApiError = VocabularyServiceError::ValidationError("x".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error.code, "VALIDATION_ERROR");

        let err: ApiError = ReaderServiceError::NotFound("reader 3".to_string()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = UserServiceError::AuthenticationError("bad".to_string()).into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err: ApiError = PostServiceError::InternalError(anyhow::anyhow!("disk on fire")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.error.message.contains("disk"));
    }
}
