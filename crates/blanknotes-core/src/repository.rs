//! Repository traits consumed by the service layer
//!
//! Each trait is object-safe so services hold `Arc<dyn ...>` and tests can
//! swap in [`crate::MemoryStore`] or a hand-written fake.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    NewNote, NewUser, Note, NoteChanges, NoteFilter, RefreshToken, User, UserChanges, UserFilter,
};
use crate::pagination::{Page, PageRequest};
use crate::Result;

/// Sort columns accepted for user listings
pub const USER_SORTS: &[&str] = &["id", "name", "created_at", "updated_at"];

/// Sort columns accepted for note listings
pub const NOTE_SORTS: &[&str] = &["id", "user_id", "title", "created_at", "updated_at"];

/// User persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Duplicate name or email fails with
    /// [`crate::NotesError::UniqueViolation`].
    async fn create(&self, user: NewUser) -> Result<User>;

    /// Fails with [`crate::NotesError::NotFound`] when no user has `email`
    async fn get_by_email(&self, email: &str) -> Result<User>;

    /// Fails with [`crate::NotesError::NotFound`] when `id` is unknown
    async fn get_by_id(&self, id: Uuid) -> Result<User>;

    async fn list(&self, filter: &UserFilter, page: &PageRequest) -> Result<Page<User>>;

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User>;

    /// Delete a user together with their notes and refresh token
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Note persistence
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a note. A title already used by the same owner fails with
    /// [`crate::NotesError::UniqueViolation`].
    async fn create(&self, note: NewNote) -> Result<Note>;

    async fn list(&self, filter: &NoteFilter, page: &PageRequest) -> Result<Page<Note>>;

    async fn get_by_id(&self, id: Uuid) -> Result<Note>;

    async fn update(&self, id: Uuid, changes: NoteChanges) -> Result<Note>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Server-side refresh token storage, one row per user
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Fails with [`crate::NotesError::NotFound`] when the user has no
    /// active refresh token
    async fn get(&self, user_id: Uuid) -> Result<RefreshToken>;

    /// Insert or replace the user's refresh token
    async fn put(&self, user_id: Uuid, token: &str) -> Result<()>;

    async fn delete(&self, token: &RefreshToken) -> Result<()>;
}
