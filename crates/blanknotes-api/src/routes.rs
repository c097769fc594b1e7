//! API route definitions

use crate::auth::{optional_auth, require_auth};
use crate::handlers::{auth, notes, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user));

    // Public but viewer-aware
    let viewer_routes = Router::new()
        .route("/notes", get(notes::list_notes))
        .route("/notes/:id", get(notes::get_note))
        .layer(middleware::from_fn_with_state(state.clone(), optional_auth));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/users/me", get(users::me_handler))
        .route("/users/:id", put(users::update_user).delete(users::delete_user))
        .route("/notes", post(notes::create_note))
        .route("/notes/:id", put(notes::update_note).delete(notes::delete_note))
        .layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .merge(public_routes)
        .merge(viewer_routes)
        .merge(protected_routes)
}
