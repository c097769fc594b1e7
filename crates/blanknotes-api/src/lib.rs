//! blanknotes API - REST server
//!
//! Cookie-based JWT sessions, user profiles and notes with per-owner
//! visibility, served under `/api/v1` with Swagger UI at `/api/v1/docs`.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod state;

use crate::auth::ACCESS_COOKIE;
use crate::handlers::{auth as auth_handlers, health, notes, users};
use crate::state::AppState;
use axum::{routing::get, Router};
use blanknotes_core::config::AppConfig;
use std::sync::Arc;
use utoipa::openapi::security::{
    ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme,
};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI document for the whole service
#[derive(OpenApi)]
#[openapi(
    paths(
        health::welcome,
        health::health_check,
        auth_handlers::register_handler,
        auth_handlers::login_handler,
        auth_handlers::refresh_handler,
        auth_handlers::logout_handler,
        users::list_users,
        users::me_handler,
        users::get_user,
        users::update_user,
        users::delete_user,
        notes::create_note,
        notes::list_notes,
        notes::get_note,
        notes::update_note,
        notes::delete_note,
    ),
    components(schemas(
        error::ApiError,
        error::ErrorDetail,
        error::FieldError,
        auth::Claims,
        handlers::MessageResponse,
        handlers::PageMetadata,
        handlers::UserEnvelope,
        handlers::UserListEnvelope,
        handlers::LoginEnvelope,
        handlers::RefreshEnvelope,
        handlers::NoteEnvelope,
        handlers::NoteListEnvelope,
        health::HealthResponse,
        auth_handlers::RegisterRequest,
        auth_handlers::LoginRequest,
        auth_handlers::LoginResponse,
        auth_handlers::TokenResponse,
        auth_handlers::RefreshResponse,
        users::UserResponse,
        users::UserListResponse,
        users::UpdateUserRequest,
        notes::NoteVisibility,
        notes::AuthorResponse,
        notes::NoteResponse,
        notes::NoteListResponse,
        notes::CreateNoteRequest,
        notes::UpdateNoteRequest,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Sessions and tokens"),
        (name = "users", description = "User profiles"),
        (name = "notes", description = "Notes"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(ACCESS_COOKIE))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the application router
///
/// Transport layers (CORS, tracing, timeouts) are added by the binary.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health::welcome))
        .route("/health", get(health::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/api/v1/docs").url("/api/v1/docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

/// Router over a fresh in-memory store with default configuration
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(AppState::in_memory(AppConfig::default())))
}
