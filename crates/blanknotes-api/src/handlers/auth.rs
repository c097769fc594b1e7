//! Authentication API handlers
//!
//! Register, login, refresh and logout. Tokens travel as HttpOnly cookies
//! and are also echoed in the response body for non-browser clients.

use super::users::UserResponse;
use super::{set_cookies, trimmed_lowercase, MessageResponse, SuccessResponse, ValidatedJson};
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::auth::{AuthenticatedIdentity, Claims, TokenKind, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Extension,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// Trimmed and lowercased before validation
    #[serde(deserialize_with = "trimmed_lowercase")]
    #[validate(length(min = 4, max = 20, message = "name must be 4 to 20 characters"))]
    pub name: String,

    #[serde(deserialize_with = "trimmed_lowercase")]
    #[validate(email(message = "invalid email"))]
    pub email: String,

    #[validate(length(min = 8, max = 100, message = "password must be 8 to 100 characters"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[serde(deserialize_with = "trimmed_lowercase")]
    #[validate(email(message = "invalid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Tokens issued at login
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Login payload: the user and their fresh tokens
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub tokens: TokenResponse,
}

/// Refresh payload
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    /// Present only when refresh tokens are rotated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub claims: Claims,
}

fn refresh_cookie(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE).map(|c| c.value().to_string())
}

/// Register a new user account
///
/// Callers that already hold a valid refresh cookie are turned away.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = crate::handlers::UserEnvelope),
        (status = 400, description = "Invalid input, duplicate name/email, or already logged in", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let context = AuditContext::from_headers(&headers);

    if state.auth.has_session(refresh_cookie(&jar).as_deref()).await {
        return Err(AppError::BadRequest("user is already registered".to_string()));
    }

    let user = match state
        .auth
        .register(&request.name, &request.email, &request.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            audit_log(
                &AuditEvent::RegistrationFailure {
                    email: request.email.clone(),
                    reason: e.to_string(),
                },
                &context,
            );
            return Err(e);
        }
    };

    audit_log(
        &AuditEvent::RegistrationSuccess {
            user_id: user.id,
            name: user.name.clone(),
        },
        &context,
    );

    Ok((
        StatusCode::CREATED,
        SuccessResponse::new("user registered", UserResponse::private(user)),
    ))
}

/// Login with email and password
///
/// Sets both session cookies and replaces any earlier refresh token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = crate::handlers::LoginEnvelope),
        (status = 400, description = "Invalid input or already logged in", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let context = AuditContext::from_headers(&headers);

    if state.auth.has_session(refresh_cookie(&jar).as_deref()).await {
        return Err(AppError::BadRequest("user is already logged in".to_string()));
    }

    let outcome = match state.auth.login(&request.email, &request.password).await {
        Ok(outcome) => outcome,
        Err(e) => {
            audit_log(
                &AuditEvent::LoginFailure {
                    email: request.email.clone(),
                    reason: e.to_string(),
                },
                &context,
            );
            return Err(e);
        }
    };

    audit_log(
        &AuditEvent::LoginSuccess {
            user_id: outcome.user.id,
            email: outcome.user.email.clone(),
        },
        &context,
    );

    let tokens = state.auth.tokens();
    let cookies = set_cookies(vec![
        state.cookies.set(
            ACCESS_COOKIE,
            &outcome.tokens.access_token,
            tokens.ttl_secs(TokenKind::Access),
        ),
        state.cookies.set(
            REFRESH_COOKIE,
            &outcome.tokens.refresh_token,
            tokens.ttl_secs(TokenKind::Refresh),
        ),
    ]);

    let body = LoginResponse {
        user: UserResponse::private(outcome.user),
        tokens: TokenResponse {
            access_token: outcome.tokens.access_token,
            refresh_token: outcome.tokens.refresh_token,
        },
    };

    Ok((
        AppendHeaders(cookies),
        SuccessResponse::new("login successful", body),
    ))
}

/// Refresh the access token
///
/// Reads the `refresh-token` cookie. The token must match the one stored
/// for its user, so a token superseded by a later login is rejected.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "New access token issued", body = crate::handlers::RefreshEnvelope),
        (status = 401, description = "Missing, invalid, or superseded refresh token", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let context = AuditContext::from_headers(&headers);
    let refresh_token = refresh_cookie(&jar).ok_or(AppError::Unauthorized)?;

    let outcome = match state.auth.refresh(&refresh_token).await {
        Ok(outcome) => outcome,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken { reason: e.to_string() }, &context);
            return Err(e);
        }
    };

    audit_log(
        &AuditEvent::TokenRefresh {
            user_id: outcome.claims.user_id,
            silent: false,
        },
        &context,
    );

    let tokens = state.auth.tokens();
    let mut cookies = vec![state.cookies.set(
        ACCESS_COOKIE,
        &outcome.access_token,
        tokens.ttl_secs(TokenKind::Access),
    )];
    if let Some(rotated) = &outcome.refresh_token {
        cookies.push(state.cookies.set(
            REFRESH_COOKIE,
            rotated,
            tokens.ttl_secs(TokenKind::Refresh),
        ));
    }

    let body = RefreshResponse {
        access_token: outcome.access_token,
        refresh_token: outcome.refresh_token,
        claims: outcome.claims,
    };

    Ok((
        AppendHeaders(set_cookies(cookies)),
        SuccessResponse::new("access token refreshed", body),
    ))
}

/// Logout and end the session
///
/// Deletes the stored refresh token and clears both cookies. A second
/// logout finds no session and fails with 404.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 404, description = "No active session", body = crate::error::ApiError),
    ),
    security(("cookie_auth" = []), ("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    state.auth.logout(identity.user_id).await?;

    audit_log(
        &AuditEvent::Logout {
            user_id: identity.user_id,
        },
        &AuditContext::from_headers(&headers),
    );

    let cookies = set_cookies(vec![
        state.cookies.clear(ACCESS_COOKIE),
        state.cookies.clear(REFRESH_COOKIE),
    ]);

    Ok((AppendHeaders(cookies), MessageResponse::new("logout successful")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_normalizes_name() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "name": "  Alice ",
            "email": "Alice@Example.com",
            "password": "password123"
        }))
        .unwrap();

        assert_eq!(request.name, "alice");
        assert_eq!(request.email, "alice@example.com");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_register_request_rules() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "name": "abc",
            "email": "not-an-email",
            "password": "short"
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_login_request_requires_password() {
        let request: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": "alice@example.com",
            "password": ""
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }
}
