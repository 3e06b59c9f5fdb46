//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints of the site:
//! - Blog post endpoints
//! - Temario (words and thematic categories) endpoints
//! - Graded reader endpoints
//! - Auth endpoints
//! - Admin endpoints (staff; user management for superusers)
//! - Static media under `/media`

pub mod admin;
pub mod admin_readers;
pub mod admin_vocabulary;
pub mod auth;
pub mod common;
pub mod middleware;
pub mod posts;
pub mod readers;
pub mod vocabulary;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware, Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Superuser only
    let superuser_routes = Router::new()
        .nest("/admin", admin::users_router())
        .route_layer(axum_middleware::from_fn(middleware::require_superuser))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Staff and superusers
    let staff_routes = Router::new()
        .nest(
            "/admin",
            admin::posts_router()
                .merge(admin_vocabulary::router())
                .merge(admin_readers::router()),
        )
        .route_layer(axum_middleware::from_fn(middleware::require_staff))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Any signed-in user
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new()
        .nest("/posts", posts::router())
        .nest("/words", vocabulary::words_router())
        .nest("/categories", vocabulary::categories_router())
        .nest("/readers", readers::router())
        .nest("/auth", auth::public_router())
        .merge(superuser_routes)
        .merge(staff_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin).allow_credentials(true),
        Err(_) => tracing::warn!("Ignoring invalid CORS origin: {}", cors_origin),
    }

    let media = ServeDir::new(&state.media.path);

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service("/media", media)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
