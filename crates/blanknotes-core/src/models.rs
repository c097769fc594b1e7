//! Domain models for users, notes, and refresh tokens
//!
//! These are storage-facing types. The HTTP layer maps them to its own
//! response DTOs, so nothing here is ever serialized straight to a client;
//! `User::password_hash` is additionally skipped by serde as a backstop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub bio: String,
    pub avatar_url: String,

    /// Argon2id PHC string; never leaves the service
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a user; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial update for a user. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.bio.is_none()
            && self.avatar_url.is_none()
            && self.password_hash.is_none()
    }
}

/// Filter for user listing
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Exact name match
    pub name: Option<String>,
}

/// Note visibility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Visibility {
    type Err = crate::NotesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(crate::NotesError::ValidationError(format!(
                "unknown visibility '{other}'"
            ))),
        }
    }
}

/// The public face of a note's owner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoteAuthor {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: String,
}

/// Note document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub cover_url: String,
    pub content: String,
    pub visibility: Visibility,
    pub user_id: Uuid,
    pub author: NoteAuthor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Whether `viewer` may read this note
    pub fn is_visible_to(&self, viewer: Option<Uuid>) -> bool {
        self.visibility == Visibility::Public || viewer == Some(self.user_id)
    }
}

/// Insert payload for a note
#[derive(Debug, Clone)]
pub struct NewNote {
    pub title: String,
    pub description: String,
    pub cover_url: String,
    pub content: String,
    pub visibility: Visibility,
    pub user_id: Uuid,
}

/// Partial update for a note
#[derive(Debug, Clone, Default)]
pub struct NoteChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub content: Option<String>,
    pub visibility: Option<Visibility>,
}

/// Filter for note listing.
///
/// `viewer` is applied on top of the other fields: a row is returned only
/// if it is public or owned by the viewer.
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    /// Exact title match
    pub title: Option<String>,
    /// Owner filter
    pub user_id: Option<Uuid>,
    pub visibility: Option<Visibility>,
    /// Who is asking; `None` for anonymous requests
    pub viewer: Option<Uuid>,
}

impl NoteFilter {
    /// Whether `note` passes every clause of this filter
    pub fn matches(&self, note: &Note) -> bool {
        self.title.as_deref().map_or(true, |t| note.title == t)
            && self.user_id.map_or(true, |u| note.user_id == u)
            && self.visibility.map_or(true, |v| note.visibility == v)
            && note.is_visible_to(self.viewer)
    }
}

/// Server-side refresh token record; at most one per user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    /// Owning user; primary key
    pub user_id: Uuid,
    /// Signed token string exactly as handed to the client
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(visibility: Visibility, owner: Uuid) -> Note {
        let now = Utc::now();
        Note {
            id: Uuid::new_v4(),
            title: "groceries".to_string(),
            description: "weekly list".to_string(),
            cover_url: "https://img.example.com/cover.png".to_string(),
            content: "milk, eggs".to_string(),
            visibility,
            user_id: owner,
            author: NoteAuthor {
                id: owner,
                name: "alice".to_string(),
                avatar_url: String::new(),
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_visibility_parse() {
        assert_eq!("public".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!("PRIVATE".parse::<Visibility>().unwrap(), Visibility::Private);
        assert!("secret".parse::<Visibility>().is_err());
        assert_eq!(Visibility::default(), Visibility::Private);
    }

    #[test]
    fn test_private_note_visibility() {
        let owner = Uuid::new_v4();
        let private = note(Visibility::Private, owner);

        assert!(private.is_visible_to(Some(owner)));
        assert!(!private.is_visible_to(Some(Uuid::new_v4())));
        assert!(!private.is_visible_to(None));
        assert!(note(Visibility::Public, owner).is_visible_to(None));
    }

    #[test]
    fn test_filter_applies_viewer() {
        let owner = Uuid::new_v4();
        let private = note(Visibility::Private, owner);

        let anonymous = NoteFilter::default();
        assert!(!anonymous.matches(&private));

        let own = NoteFilter {
            visibility: Some(Visibility::Private),
            viewer: Some(owner),
            ..Default::default()
        };
        assert!(own.matches(&private));

        let other_title = NoteFilter {
            title: Some("other".to_string()),
            viewer: Some(owner),
            ..Default::default()
        };
        assert!(!other_title.matches(&private));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "alice".to_string(),
            email: "alice@example.com".to_string(),
            bio: String::new(),
            avatar_url: String::new(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("$argon2id$secret"));
    }
}
