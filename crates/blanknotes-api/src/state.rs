//! Application state management

use crate::auth::{
    Argon2Hasher, AuthService, CookiePolicy, CredentialHasher, JwtTokenService, PasswordConfig,
    TokenIssuer,
};
use crate::services::{NoteService, UserService};
use blanknotes_core::config::AppConfig;
use blanknotes_core::{NoteRepository, RefreshTokenStore, UserRepository};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    pub auth: AuthService,
    pub users: UserService,
    pub notes: NoteService,
    pub cookies: CookiePolicy,
}

impl AppState {
    /// Wire services over a store that implements every repository
    pub fn new<S>(config: AppConfig, store: Arc<S>) -> Self
    where
        S: UserRepository + NoteRepository + RefreshTokenStore + 'static,
    {
        Self::with_hasher(config, store, Arc::new(Argon2Hasher::default()))
    }

    /// Like [`AppState::new`] with a custom credential hasher
    pub fn with_hasher<S>(
        config: AppConfig,
        store: Arc<S>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self
    where
        S: UserRepository + NoteRepository + RefreshTokenStore + 'static,
    {
        let tokens: Arc<dyn TokenIssuer> = Arc::new(JwtTokenService::new(&config.auth));

        Self::from_parts(config, store.clone(), store.clone(), store, hasher, tokens)
    }

    /// Wire services from individual capabilities
    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserRepository>,
        notes: Arc<dyn NoteRepository>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        let auth = AuthService::new(
            users.clone(),
            refresh_tokens,
            hasher.clone(),
            tokens,
            config.auth.rotate_refresh_tokens,
        );

        Self {
            cookies: CookiePolicy::new(config.server.dev),
            start_time: Instant::now(),
            auth,
            users: UserService::new(users, hasher),
            notes: NoteService::new(notes),
            config,
        }
    }

    /// State over a fresh in-memory store with cheap password hashing
    pub fn in_memory(mut config: AppConfig) -> Self {
        config.database.url = "memory://".to_string();
        Self::with_hasher(
            config,
            Arc::new(blanknotes_core::MemoryStore::new()),
            Arc::new(Argon2Hasher::new(PasswordConfig::minimal())),
        )
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
