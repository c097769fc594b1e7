//! User API handlers

use super::{
    clamp_u32, non_empty, non_empty_lowercase, set_cookies, validate_image_url, MessageResponse,
    PageMetadata, SuccessResponse, ValidatedJson,
};
use crate::auth::{AuthenticatedIdentity, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::error::AppError;
use crate::services::ProfileUpdate;
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::{AppendHeaders, IntoResponse},
    Extension,
};
use blanknotes_core::{PageRequest, User, UserFilter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// User as seen by clients; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    /// Only shown to the account owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub bio: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserResponse {
    /// View for the account owner
    pub fn private(user: User) -> Self {
        Self {
            email: Some(user.email.clone()),
            ..Self::public(user)
        }
    }

    /// View for everyone else
    pub fn public(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: None,
            bio: user.bio,
            avatar_url: user.avatar_url,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub metadata: PageMetadata,
}

/// Query parameters for listing users
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// Exact match on the user name
    pub name: Option<String>,
    /// One of `id`, `name`, `created_at`, `updated_at`
    pub sort: Option<String>,
    /// `asc` or `desc`
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl ListUsersQuery {
    fn into_parts(self) -> (UserFilter, PageRequest) {
        (
            UserFilter {
                name: self.name.filter(|n| !n.is_empty()),
            },
            PageRequest {
                sort: self.sort,
                order: self.order,
                limit: clamp_u32(self.limit),
                page: clamp_u32(self.page),
            },
        )
    }
}

/// Profile update; omitted or empty fields stay unchanged
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[serde(default, deserialize_with = "non_empty_lowercase")]
    #[validate(length(min = 4, max = 20, message = "name must be 4 to 20 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "non_empty_lowercase")]
    #[validate(email(message = "invalid email"))]
    pub email: Option<String>,

    #[serde(default)]
    #[validate(length(max = 50, message = "bio must be at most 50 characters"))]
    pub bio: Option<String>,

    #[serde(default, deserialize_with = "non_empty")]
    #[validate(
        url(message = "invalid url"),
        custom(function = "validate_image_url", message = "avatar must be a .jpg or .png image")
    )]
    pub avatar_url: Option<String>,

    #[serde(default, deserialize_with = "non_empty")]
    #[validate(length(min = 8, max = 100, message = "password must be 8 to 100 characters"))]
    pub password: Option<String>,
}

impl From<UpdateUserRequest> for ProfileUpdate {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            bio: req.bio,
            avatar_url: req.avatar_url,
            password: req.password,
        }
    }
}

/// List users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Page of users", body = crate::handlers::UserListEnvelope),
        (status = 400, description = "Invalid query", body = crate::error::ApiError),
    )
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let (filter, page) = query.into_parts();

    let page = state.users.list(&filter, &page).await?;
    let body = UserListResponse {
        users: page.items.into_iter().map(UserResponse::public).collect(),
        metadata: page.metadata.into(),
    };

    Ok(SuccessResponse::new("users retrieved", body))
}

/// Profile of the caller
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Caller's profile", body = crate::handlers::UserEnvelope),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("cookie_auth" = []), ("bearer_auth" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.get(identity.user_id).await?;
    Ok(SuccessResponse::new("user retrieved", UserResponse::private(user)))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = crate::handlers::UserEnvelope),
        (status = 400, description = "Malformed ID", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let user = state.users.get(id).await?;
    Ok(SuccessResponse::new("user retrieved", UserResponse::public(user)))
}

/// Update the caller's own profile
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = crate::handlers::UserEnvelope),
        (status = 400, description = "Invalid input or duplicate name/email", body = crate::error::ApiError),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Not the account owner", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("cookie_auth" = []), ("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    id: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let user = state.users.update(id, request.into(), &identity).await?;
    Ok(SuccessResponse::new("user updated", UserResponse::private(user)))
}

/// Delete the caller's own account
///
/// Removes the user's notes and session too, and clears the session
/// cookies.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Not the account owner", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("cookie_auth" = []), ("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    state.users.delete(id, &identity).await?;

    let cookies = set_cookies(vec![
        state.cookies.clear(ACCESS_COOKIE),
        state.cookies.clear(REFRESH_COOKIE),
    ]);

    Ok((AppendHeaders(cookies), MessageResponse::new("user deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "alice".to_string(),
            email: "alice@example.com".to_string(),
            bio: String::new(),
            avatar_url: String::new(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_response_never_contains_password() {
        let json = serde_json::to_string(&UserResponse::private(user())).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("alice@example.com"));

        let json = serde_json::to_string(&UserResponse::public(user())).unwrap();
        assert!(!json.contains("email"));
    }

    #[test]
    fn test_update_request_empty_fields_are_unchanged() {
        let request: UpdateUserRequest = serde_json::from_value(serde_json::json!({
            "name": "",
            "password": "",
            "bio": "hi"
        }))
        .unwrap();

        assert!(request.name.is_none());
        assert!(request.password.is_none());
        assert_eq!(request.bio.as_deref(), Some("hi"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_update_request_avatar_rules() {
        let request: UpdateUserRequest = serde_json::from_value(serde_json::json!({
            "avatar_url": "https://cdn.example.com/me.gif"
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("avatar_url"));
    }

    #[test]
    fn test_negative_paging_falls_back() {
        let (_, page) = ListUsersQuery {
            limit: Some(-3),
            page: Some(-1),
            ..Default::default()
        }
        .into_parts();

        let metadata = page.normalize(0, blanknotes_core::repository::USER_SORTS);
        assert_eq!(metadata.limit, 10);
        assert_eq!(metadata.page, 1);
    }
}
