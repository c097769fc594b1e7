//! Authentication middleware for protecting routes
//!
//! Reads the access token from the `access-token` cookie (or a Bearer
//! header), validates it, and puts an [`AuthenticatedIdentity`] into the
//! request extensions. When the access token is missing or stale but the
//! `refresh-token` cookie still opens a session, a new access token is
//! minted and set on the response.

use super::cookies::{ACCESS_COOKIE, REFRESH_COOKIE};
use super::jwt::{Claims, TokenKind};
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Identity of the caller, decoded from a validated access token
///
/// Handlers extract it with `Extension<AuthenticatedIdentity>` behind
/// [`require_auth`], or `Option<Extension<AuthenticatedIdentity>>` behind
/// [`optional_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub user_id: Uuid,
}

impl AuthenticatedIdentity {
    /// Fail with [`AppError::Forbidden`] unless the caller is `owner_id`
    pub fn ensure_owner(&self, owner_id: Uuid, resource: &str) -> Result<(), AppError> {
        if self.user_id == owner_id {
            return Ok(());
        }

        audit_log(
            &AuditEvent::AccessDenied {
                user_id: self.user_id,
                resource: resource.to_string(),
            },
            &AuditContext::default(),
        );
        Err(AppError::Forbidden)
    }
}

impl From<Claims> for AuthenticatedIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
        }
    }
}

fn access_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Middleware that requires an authenticated caller
///
/// ```ignore
/// let protected = Router::new()
///     .route("/notes", post(notes::create_note))
///     .layer(middleware::from_fn_with_state(state.clone(), require_auth));
/// ```
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let context = AuditContext::from_headers(request.headers());
    let jar = CookieJar::from_headers(request.headers());
    let tokens = state.auth.tokens();

    let access_error = match access_token(request.headers(), &jar) {
        Some(token) => match tokens.validate(&token, TokenKind::Access) {
            Ok(claims) => {
                request
                    .extensions_mut()
                    .insert(AuthenticatedIdentity::from(claims));
                return Ok(next.run(request).await);
            }
            Err(e) => Some(e),
        },
        None => None,
    };

    let Some(refresh_token) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()) else {
        if let Some(e) = access_error {
            audit_log(&AuditEvent::InvalidToken { reason: e.to_string() }, &context);
        }
        return Err(AppError::Unauthorized);
    };

    let outcome = match state.auth.refresh(&refresh_token).await {
        Ok(outcome) => outcome,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken { reason: e.to_string() }, &context);
            return Err(AppError::Unauthorized);
        }
    };

    debug!(user_id = %outcome.claims.user_id, "Access token silently refreshed");
    audit_log(
        &AuditEvent::TokenRefresh {
            user_id: outcome.claims.user_id,
            silent: true,
        },
        &context,
    );

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

    request
        .extensions_mut()
        .insert(AuthenticatedIdentity::from(outcome.claims));

    let mut response = next.run(request).await;
    for cookie in cookies {
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::Internal(format!("Invalid cookie header: {e}")))?;
        response.headers_mut().append(header::SET_COOKIE, value);
    }

    Ok(response)
}

/// Optional authentication middleware
///
/// Attaches the identity when a valid access token is present. Never fails
/// and never refreshes; for endpoints that are public but viewer-aware.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());

    if let Some(token) = access_token(request.headers(), &jar) {
        if let Ok(claims) = state.auth.tokens().validate(&token, TokenKind::Access) {
            request
                .extensions_mut()
                .insert(AuthenticatedIdentity::from(claims));
        }
    }

    next.run(request).await
}
