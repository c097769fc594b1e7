//! Authentication service layer
//!
//! Register, login, logout and refresh flows. The service only talks to
//! the capability traits ([`UserRepository`], [`RefreshTokenStore`],
//! [`CredentialHasher`], [`TokenIssuer`]), so it runs unchanged against
//! PostgreSQL, the in-memory store, or test fakes.

use super::jwt::{Claims, TokenIssuer, TokenKind};
use super::password::CredentialHasher;
use crate::error::AppError;
use blanknotes_core::{NewUser, NotesError, RefreshTokenStore, User, UserRepository};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Freshly issued access and refresh tokens
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
}

/// Result of a successful refresh
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    /// Replacement refresh token; only set when rotation is enabled
    pub refresh_token: Option<String>,
    pub claims: Claims,
}

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenIssuer>,
    rotate_refresh_tokens: bool,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenIssuer>,
        rotate_refresh_tokens: bool,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            hasher,
            tokens,
            rotate_refresh_tokens,
        }
    }

    /// Token issuer used by this service
    pub fn tokens(&self) -> &Arc<dyn TokenIssuer> {
        &self.tokens
    }

    /// Create an account
    ///
    /// Duplicate name or email surfaces as [`AppError::DuplicateName`] /
    /// [`AppError::DuplicateEmail`] whatever the storage backend.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AppError> {
        let password_hash = self.hasher.hash(password)?;

        let user = self
            .users
            .create(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await?;

        Ok(user)
    }

    /// Check credentials and open a session
    ///
    /// Replaces any refresh token the user already had, so a second login
    /// invalidates the first session's refresh token. Unknown email and
    /// wrong password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let user = match self.users.get_by_email(email).await {
            Ok(user) => user,
            Err(NotesError::NotFound(_)) => return Err(AppError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        let access_token = self.tokens.issue_access(user.id)?;
        let refresh_token = self.tokens.issue_refresh(user.id)?;

        self.refresh_tokens.put(user.id, &refresh_token).await?;

        Ok(LoginOutcome {
            user,
            tokens: TokenPair {
                access_token,
                refresh_token,
            },
        })
    }

    /// End the user's session
    ///
    /// Fails with [`AppError::NotFound`] when there is no session left to
    /// end.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        let stored = self.refresh_tokens.get(user_id).await?;
        self.refresh_tokens.delete(&stored).await?;
        Ok(())
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The token must verify against the refresh secret and match the one
    /// stored for its user byte for byte; a token superseded by a later
    /// login is rejected.
    pub async fn refresh(&self, token: &str) -> Result<RefreshOutcome, AppError> {
        let claims = self.active_claims(token).await?;

        let access_token = self.tokens.issue_access(claims.user_id)?;

        let refresh_token = if self.rotate_refresh_tokens {
            let rotated = self.tokens.issue_refresh(claims.user_id)?;
            self.refresh_tokens.put(claims.user_id, &rotated).await?;
            Some(rotated)
        } else {
            None
        };

        Ok(RefreshOutcome {
            access_token,
            refresh_token,
            claims,
        })
    }

    /// Whether `refresh_token` is the live session of its user
    ///
    /// Same checks as [`AuthService::refresh`]: a token superseded by a
    /// later login or ended by logout does not count.
    pub async fn has_session(&self, refresh_token: Option<&str>) -> bool {
        match refresh_token {
            Some(token) => self.active_claims(token).await.is_ok(),
            None => false,
        }
    }

    async fn active_claims(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.tokens.validate(token, TokenKind::Refresh)?;

        let stored = match self.refresh_tokens.get(claims.user_id).await {
            Ok(stored) => stored,
            Err(NotesError::NotFound(_)) => {
                debug!(user_id = %claims.user_id, "Refresh token has no active session");
                return Err(AppError::Unauthorized);
            }
            Err(e) => return Err(e.into()),
        };

        if stored.token != token {
            debug!(user_id = %claims.user_id, "Refresh token does not match active session");
            return Err(AppError::Unauthorized);
        }

        Ok(claims)
    }
}
