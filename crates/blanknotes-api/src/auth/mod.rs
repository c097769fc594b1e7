//! Authentication and authorization
//!
//! - Argon2id credential hashing
//! - Access/refresh JWT issuance and validation
//! - Session cookies
//! - Register/login/logout/refresh orchestration
//! - Request guards and ownership checks

pub mod cookies;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use cookies::{CookiePolicy, ACCESS_COOKIE, REFRESH_COOKIE};
pub use jwt::{Claims, Clock, FixedClock, JwtTokenService, SystemClock, TokenError, TokenIssuer, TokenKind};
pub use middleware::{optional_auth, require_auth, AuthenticatedIdentity};
pub use password::{Argon2Hasher, CredentialHasher, PasswordConfig, PasswordError};
pub use service::{AuthService, LoginOutcome, RefreshOutcome, TokenPair};
