//! JWT token generation and validation
//!
//! Access and refresh tokens are both HS256 JWTs carrying the same
//! [`Claims`], but they are signed with different secrets and have
//! different lifetimes. A token is only ever validated against the secret
//! of the kind the caller expects, so an access token presented as a
//! refresh token fails signature verification.

use blanknotes_core::AuthConfig;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// JWT claims shared by access and refresh tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    /// Owner of the token
    pub user_id: Uuid,
    /// Expiration timestamp (Unix epoch seconds)
    pub exp: u64,
    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,
    /// Unique token identifier; keeps two tokens minted in the same
    /// second distinct
    pub jti: String,
}

/// Which secret and lifetime a token uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Token generation and validation errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, wrong secret, or not a JWT at all
    #[error("Invalid token")]
    InvalidToken,

    /// Signature is fine but the payload does not decode into [`Claims`]
    #[error("Invalid token claims")]
    InvalidClaims,

    #[error("Token has expired")]
    Expired,

    #[error("Failed to encode JWT: {0}")]
    Encoding(String),
}

/// Source of the current Unix time in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

/// Token issuance and validation
pub trait TokenIssuer: Send + Sync {
    fn issue_access(&self, user_id: Uuid) -> Result<String, TokenError>;

    fn issue_refresh(&self, user_id: Uuid) -> Result<String, TokenError>;

    /// Verify `token` with the secret for `kind` and decode its claims
    fn validate(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError>;

    /// Lifetime in seconds of tokens of `kind`
    fn ttl_secs(&self, kind: TokenKind) -> u64;
}

struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl SigningKey {
    fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }
}

/// HS256 implementation of [`TokenIssuer`]
pub struct JwtTokenService {
    access: SigningKey,
    refresh: SigningKey,
    clock: Arc<dyn Clock>,
}

impl JwtTokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            access: SigningKey::new(&config.access_secret, config.access_ttl_secs),
            refresh: SigningKey::new(&config.refresh_secret, config.refresh_ttl_secs),
            clock,
        }
    }

    fn key(&self, kind: TokenKind) -> &SigningKey {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn issue(&self, user_id: Uuid, kind: TokenKind) -> Result<String, TokenError> {
        let key = self.key(kind);
        let now = self.clock.now();

        let claims = Claims {
            user_id,
            exp: now + key.ttl_secs,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &key.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }
}

impl TokenIssuer for JwtTokenService {
    fn issue_access(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(user_id, TokenKind::Access)
    }

    fn issue_refresh(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(user_id, TokenKind::Refresh)
    }

    fn validate(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        // a garbled header is a format failure, not a claims failure
        decode_header(token).map_err(|_| TokenError::InvalidToken)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.key(kind).decoding, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidClaims,
                _ => TokenError::InvalidToken,
            },
        )?;

        // the library compares against wall time; `exp == now` counts as expired here
        if token_data.claims.exp <= self.clock.now() {
            return Err(TokenError::Expired);
        }

        Ok(token_data.claims)
    }

    fn ttl_secs(&self, kind: TokenKind) -> u64 {
        self.key(kind).ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> AuthConfig {
        AuthConfig {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            ..Default::default()
        }
    }

    fn service_at(now: u64) -> JwtTokenService {
        JwtTokenService::with_clock(&config(), Arc::new(FixedClock(now)))
    }

    fn wall_now() -> u64 {
        SystemClock.now()
    }

    #[test]
    fn test_generate_and_validate_token() {
        let service = JwtTokenService::new(&config());
        let user_id = Uuid::new_v4();

        let token = service.issue_access(user_id).expect("Failed to generate token");
        let claims = service
            .validate(&token, TokenKind::Access)
            .expect("Failed to validate token");

        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.exp - claims.iat, 600);
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_refresh_lifetime() {
        let service = JwtTokenService::new(&config());
        let token = service.issue_refresh(Uuid::new_v4()).unwrap();
        let claims = service.validate(&token, TokenKind::Refresh).unwrap();
        assert_eq!(claims.exp - claims.iat, 86_400);
    }

    #[test]
    fn test_kinds_do_not_cross_validate() {
        let service = JwtTokenService::new(&config());
        let access = service.issue_access(Uuid::new_v4()).unwrap();
        let refresh = service.issue_refresh(Uuid::new_v4()).unwrap();

        assert!(matches!(
            service.validate(&access, TokenKind::Refresh),
            Err(TokenError::InvalidToken)
        ));
        assert!(matches!(
            service.validate(&refresh, TokenKind::Access),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_invalid_token() {
        let service = JwtTokenService::new(&config());
        assert!(matches!(
            service.validate("invalid.token.here", TokenKind::Access),
            Err(TokenError::InvalidToken)
        ));
        assert!(matches!(
            service.validate("", TokenKind::Access),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = wall_now();
        let token = service_at(now).issue_access(Uuid::new_v4()).unwrap();

        // one second before exp is still valid
        assert!(service_at(now + 599)
            .validate(&token, TokenKind::Access)
            .is_ok());

        // exp == now is expired
        assert!(matches!(
            service_at(now + 600).validate(&token, TokenKind::Access),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_expired_token() {
        let now = wall_now();
        let token = service_at(now - 7200).issue_access(Uuid::new_v4()).unwrap();

        let result = JwtTokenService::new(&config()).validate(&token, TokenKind::Access);
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn test_malformed_claims() {
        #[derive(Serialize)]
        struct Foreign {
            user_id: &'static str,
            exp: u64,
        }

        let token = encode(
            &Header::new(Algorithm::HS256),
            &Foreign {
                user_id: "not-a-uuid",
                exp: wall_now() + 600,
            },
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();

        let result = JwtTokenService::new(&config()).validate(&token, TokenKind::Access);
        assert!(matches!(result, Err(TokenError::InvalidClaims)));
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let service = service_at(wall_now());
        let user_id = Uuid::new_v4();
        assert_ne!(
            service.issue_refresh(user_id).unwrap(),
            service.issue_refresh(user_id).unwrap()
        );
    }

    proptest! {
        #[test]
        fn prop_token_round_trip(bytes in any::<[u8; 16]>()) {
            let service = JwtTokenService::new(&config());
            let user_id = Uuid::from_bytes(bytes);

            let access = service.issue_access(user_id).unwrap();
            prop_assert_eq!(service.validate(&access, TokenKind::Access).unwrap().user_id, user_id);

            let refresh = service.issue_refresh(user_id).unwrap();
            prop_assert_eq!(service.validate(&refresh, TokenKind::Refresh).unwrap().user_id, user_id);
        }
    }
}
