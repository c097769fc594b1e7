//! Note service
//!
//! Reads honor visibility: anonymous viewers see public notes only, and a
//! private note is readable by its owner alone. Writes are owner-only.

use crate::auth::AuthenticatedIdentity;
use crate::error::AppError;
use blanknotes_core::{
    NewNote, Note, NoteChanges, NoteFilter, NoteRepository, Page, PageRequest, Visibility,
};
use std::sync::Arc;
use uuid::Uuid;

/// Content of a new note; the owner comes from the caller's identity
#[derive(Debug, Clone)]
pub struct NoteDraft {
    pub title: String,
    pub description: String,
    pub cover_url: String,
    pub content: String,
    pub visibility: Visibility,
}

pub struct NoteService {
    notes: Arc<dyn NoteRepository>,
}

impl NoteService {
    pub fn new(notes: Arc<dyn NoteRepository>) -> Self {
        Self { notes }
    }

    pub async fn create(
        &self,
        identity: &AuthenticatedIdentity,
        draft: NoteDraft,
    ) -> Result<Note, AppError> {
        let note = self
            .notes
            .create(NewNote {
                title: draft.title,
                description: draft.description,
                cover_url: draft.cover_url,
                content: draft.content,
                visibility: draft.visibility,
                user_id: identity.user_id,
            })
            .await?;

        Ok(note)
    }

    /// List notes visible to `viewer`
    pub async fn list(
        &self,
        filter: NoteFilter,
        viewer: Option<Uuid>,
        page: &PageRequest,
    ) -> Result<Page<Note>, AppError> {
        let filter = NoteFilter { viewer, ..filter };
        Ok(self.notes.list(&filter, page).await?)
    }

    /// Fetch one note
    ///
    /// A private note requested by anyone but its owner fails with
    /// [`AppError::Unauthorized`].
    pub async fn get(&self, id: Uuid, viewer: Option<Uuid>) -> Result<Note, AppError> {
        let note = self.notes.get_by_id(id).await?;
        if !note.is_visible_to(viewer) {
            return Err(AppError::Unauthorized);
        }
        Ok(note)
    }

    pub async fn update(
        &self,
        id: Uuid,
        changes: NoteChanges,
        identity: &AuthenticatedIdentity,
    ) -> Result<Note, AppError> {
        let note = self.notes.get_by_id(id).await?;
        identity.ensure_owner(note.user_id, "note")?;
        Ok(self.notes.update(id, changes).await?)
    }

    pub async fn delete(&self, id: Uuid, identity: &AuthenticatedIdentity) -> Result<(), AppError> {
        let note = self.notes.get_by_id(id).await?;
        identity.ensure_owner(note.user_id, "note")?;
        Ok(self.notes.delete(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blanknotes_core::{MemoryStore, NewUser, UserRepository};

    struct Fixture {
        service: NoteService,
        alice: AuthenticatedIdentity,
        bob: AuthenticatedIdentity,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mut ids = Vec::new();
        for (name, email) in [("alice", "alice@example.com"), ("bobby", "bob@example.com")] {
            let user = UserRepository::create(
                store.as_ref(),
                NewUser {
                    name: name.to_string(),
                    email: email.to_string(),
                    password_hash: "hash".to_string(),
                },
            )
            .await
            .unwrap();
            ids.push(user.id);
        }

        Fixture {
            service: NoteService::new(store),
            alice: AuthenticatedIdentity { user_id: ids[0] },
            bob: AuthenticatedIdentity { user_id: ids[1] },
        }
    }

    fn draft(title: &str, visibility: Visibility) -> NoteDraft {
        NoteDraft {
            title: title.to_string(),
            description: "desc".to_string(),
            cover_url: "https://img.example.com/cover.png".to_string(),
            content: "body".to_string(),
            visibility,
        }
    }

    #[tokio::test]
    async fn test_create_sets_owner_and_author() {
        let f = fixture().await;
        let note = f
            .service
            .create(&f.alice, draft("groceries", Visibility::Public))
            .await
            .unwrap();

        assert_eq!(note.user_id, f.alice.user_id);
        assert_eq!(note.author.name, "alice");
    }

    #[tokio::test]
    async fn test_duplicate_title_for_same_owner() {
        let f = fixture().await;
        f.service
            .create(&f.alice, draft("groceries", Visibility::Public))
            .await
            .unwrap();

        let err = f
            .service
            .create(&f.alice, draft("groceries", Visibility::Private))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateTitle));
    }

    #[tokio::test]
    async fn test_private_note_access() {
        let f = fixture().await;
        let note = f
            .service
            .create(&f.alice, draft("diary", Visibility::Private))
            .await
            .unwrap();

        assert!(f.service.get(note.id, Some(f.alice.user_id)).await.is_ok());
        assert!(matches!(
            f.service.get(note.id, Some(f.bob.user_id)).await,
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            f.service.get(note.id, None).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete_ownership() {
        let f = fixture().await;
        let note = f
            .service
            .create(&f.alice, draft("diary", Visibility::Public))
            .await
            .unwrap();

        let changes = NoteChanges {
            content: Some("edited".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update(note.id, changes.clone(), &f.bob).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            f.service.delete(note.id, &f.bob).await,
            Err(AppError::Forbidden)
        ));

        let updated = f.service.update(note.id, changes, &f.alice).await.unwrap();
        assert_eq!(updated.content, "edited");

        f.service.delete(note.id, &f.alice).await.unwrap();
        assert!(matches!(
            f.service.delete(note.id, &f.alice).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_visibility() {
        let f = fixture().await;
        f.service
            .create(&f.alice, draft("open", Visibility::Public))
            .await
            .unwrap();
        f.service
            .create(&f.alice, draft("secret", Visibility::Private))
            .await
            .unwrap();

        let page = PageRequest::default();
        let anonymous = f.service.list(NoteFilter::default(), None, &page).await.unwrap();
        assert_eq!(anonymous.items.len(), 1);

        let other = f
            .service
            .list(NoteFilter::default(), Some(f.bob.user_id), &page)
            .await
            .unwrap();
        assert_eq!(other.items.len(), 1);

        let owner = f
            .service
            .list(NoteFilter::default(), Some(f.alice.user_id), &page)
            .await
            .unwrap();
        assert_eq!(owner.items.len(), 2);
    }
}
