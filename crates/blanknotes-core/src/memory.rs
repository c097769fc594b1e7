//! In-memory store
//!
//! Implements every repository trait over plain maps behind a tokio
//! `RwLock`. Used by the test suites and by `DATABASE_URL=memory://` for
//! running the server without PostgreSQL. Uniqueness and cascade rules
//! mirror the SQL schema, and violations are reported with the same
//! PostgreSQL codes and constraint names the real store would produce.

use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    NewNote, NewUser, Note, NoteAuthor, NoteChanges, NoteFilter, RefreshToken, User, UserChanges,
    UserFilter,
};
use crate::pagination::{Page, PageRequest};
use crate::repository::{
    NoteRepository, RefreshTokenStore, UserRepository, NOTE_SORTS, USER_SORTS,
};
use crate::{NotesError, Result, UniqueViolation};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    notes: HashMap<Uuid, StoredNote>,
    refresh_tokens: HashMap<Uuid, String>,
}

/// Note row without the joined author
#[derive(Clone)]
struct StoredNote {
    note: NewNote,
    id: Uuid,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl Tables {
    fn check_user_unique(&self, id: Option<Uuid>, name: &str, email: &str) -> Result<()> {
        for user in self.users.values().filter(|u| Some(u.id) != id) {
            if user.email == email {
                return Err(NotesError::UniqueViolation(UniqueViolation::postgres(
                    "users_email_key",
                )));
            }
            if user.name == name {
                return Err(NotesError::UniqueViolation(UniqueViolation::postgres(
                    "users_name_key",
                )));
            }
        }
        Ok(())
    }

    fn check_title_unique(&self, id: Option<Uuid>, user_id: Uuid, title: &str) -> Result<()> {
        let taken = self
            .notes
            .values()
            .any(|n| Some(n.id) != id && n.note.user_id == user_id && n.note.title == title);
        if taken {
            return Err(NotesError::UniqueViolation(UniqueViolation::postgres(
                "notes_user_id_title_key",
            )));
        }
        Ok(())
    }

    fn join_author(&self, stored: &StoredNote) -> Result<Note> {
        let owner = self
            .users
            .get(&stored.note.user_id)
            .ok_or_else(|| NotesError::DatabaseError("note owner missing".to_string()))?;

        Ok(Note {
            id: stored.id,
            title: stored.note.title.clone(),
            description: stored.note.description.clone(),
            cover_url: stored.note.cover_url.clone(),
            content: stored.note.content.clone(),
            visibility: stored.note.visibility,
            user_id: stored.note.user_id,
            author: NoteAuthor {
                id: owner.id,
                name: owner.name.clone(),
                avatar_url: owner.avatar_url.clone(),
            },
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }
}

/// Thread-safe in-memory implementation of all repositories
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare_users(a: &User, b: &User, sort: &str) -> Ordering {
    match sort {
        "id" => a.id.cmp(&b.id),
        "name" => a.name.cmp(&b.name),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        _ => a.created_at.cmp(&b.created_at),
    }
}

fn compare_notes(a: &Note, b: &Note, sort: &str) -> Ordering {
    match sort {
        "id" => a.id.cmp(&b.id),
        "user_id" => a.user_id.cmp(&b.user_id),
        "title" => a.title.cmp(&b.title),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        _ => a.created_at.cmp(&b.created_at),
    }
}

fn paginate<T>(
    mut rows: Vec<T>,
    request: &PageRequest,
    allowed_sorts: &[&str],
    compare: impl Fn(&T, &T, &str) -> Ordering,
) -> Page<T> {
    let metadata = request.normalize(rows.len() as u64, allowed_sorts);

    rows.sort_by(|a, b| {
        let ord = compare(a, b, &metadata.sort);
        if metadata.is_descending() {
            ord.reverse()
        } else {
            ord
        }
    });

    let items = rows
        .into_iter()
        .skip(metadata.offset() as usize)
        .take(metadata.limit as usize)
        .collect();

    Page { items, metadata }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        tables.check_user_unique(None, &user.name, &user.email)?;

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            bio: String::new(),
            avatar_url: String::new(),
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| NotesError::NotFound("User".to_string()))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| NotesError::NotFound("User".to_string()))
    }

    async fn list(&self, filter: &UserFilter, page: &PageRequest) -> Result<Page<User>> {
        let tables = self.tables.read().await;
        let rows: Vec<User> = tables
            .users
            .values()
            .filter(|u| filter.name.as_deref().map_or(true, |n| u.name == n))
            .cloned()
            .collect();

        Ok(paginate(rows, page, USER_SORTS, compare_users))
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User> {
        let mut tables = self.tables.write().await;
        let current = tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| NotesError::NotFound("User".to_string()))?;

        let name = changes.name.unwrap_or(current.name);
        let email = changes.email.unwrap_or(current.email);
        tables.check_user_unique(Some(id), &name, &email)?;

        let updated = User {
            name,
            email,
            bio: changes.bio.unwrap_or(current.bio),
            avatar_url: changes.avatar_url.unwrap_or(current.avatar_url),
            password_hash: changes.password_hash.unwrap_or(current.password_hash),
            updated_at: Utc::now(),
            ..current
        };
        tables.users.insert(id, updated.clone());

        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Err(NotesError::NotFound("User".to_string()));
        }
        tables.notes.retain(|_, n| n.note.user_id != id);
        tables.refresh_tokens.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl NoteRepository for MemoryStore {
    async fn create(&self, note: NewNote) -> Result<Note> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&note.user_id) {
            return Err(NotesError::NotFound("User".to_string()));
        }
        tables.check_title_unique(None, note.user_id, &note.title)?;

        let now = Utc::now();
        let stored = StoredNote {
            note,
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        let created = tables.join_author(&stored)?;
        tables.notes.insert(stored.id, stored);

        Ok(created)
    }

    async fn list(&self, filter: &NoteFilter, page: &PageRequest) -> Result<Page<Note>> {
        let tables = self.tables.read().await;
        let mut rows = Vec::new();
        for stored in tables.notes.values() {
            let note = tables.join_author(stored)?;
            if filter.matches(&note) {
                rows.push(note);
            }
        }

        Ok(paginate(rows, page, NOTE_SORTS, compare_notes))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Note> {
        let tables = self.tables.read().await;
        let stored = tables
            .notes
            .get(&id)
            .ok_or_else(|| NotesError::NotFound("Note".to_string()))?;
        tables.join_author(stored)
    }

    async fn update(&self, id: Uuid, changes: NoteChanges) -> Result<Note> {
        let mut tables = self.tables.write().await;
        let mut stored = tables
            .notes
            .get(&id)
            .cloned()
            .ok_or_else(|| NotesError::NotFound("Note".to_string()))?;

        if let Some(title) = changes.title {
            tables.check_title_unique(Some(id), stored.note.user_id, &title)?;
            stored.note.title = title;
        }
        if let Some(description) = changes.description {
            stored.note.description = description;
        }
        if let Some(cover_url) = changes.cover_url {
            stored.note.cover_url = cover_url;
        }
        if let Some(content) = changes.content {
            stored.note.content = content;
        }
        if let Some(visibility) = changes.visibility {
            stored.note.visibility = visibility;
        }
        stored.updated_at = Utc::now();

        let updated = tables.join_author(&stored)?;
        tables.notes.insert(id, stored);

        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .notes
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| NotesError::NotFound("Note".to_string()))
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn get(&self, user_id: Uuid) -> Result<RefreshToken> {
        let tables = self.tables.read().await;
        tables
            .refresh_tokens
            .get(&user_id)
            .map(|token| RefreshToken {
                user_id,
                token: token.clone(),
            })
            .ok_or_else(|| NotesError::NotFound("Refresh token".to_string()))
    }

    async fn put(&self, user_id: Uuid, token: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(NotesError::NotFound("User".to_string()));
        }
        tables.refresh_tokens.insert(user_id, token.to_string());
        Ok(())
    }

    async fn delete(&self, token: &RefreshToken) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.refresh_tokens.remove(&token.user_id);
        Ok(())
    }
}
