//! User profile service

use crate::auth::{AuthenticatedIdentity, CredentialHasher};
use crate::error::AppError;
use blanknotes_core::{Page, PageRequest, User, UserChanges, UserFilter, UserRepository};
use std::sync::Arc;
use uuid::Uuid;

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    /// Plaintext; re-hashed before storage. Empty means unchanged.
    pub password: Option<String>,
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn CredentialHasher>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { users, hasher }
    }

    pub async fn list(&self, filter: &UserFilter, page: &PageRequest) -> Result<Page<User>, AppError> {
        Ok(self.users.list(filter, page).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, AppError> {
        Ok(self.users.get_by_id(id).await?)
    }

    /// Update the caller's own profile
    ///
    /// Ownership is checked before the lookup, so a stranger gets
    /// [`AppError::Forbidden`] even for ids that do not exist.
    pub async fn update(
        &self,
        id: Uuid,
        update: ProfileUpdate,
        identity: &AuthenticatedIdentity,
    ) -> Result<User, AppError> {
        identity.ensure_owner(id, "user")?;
        let current = self.users.get_by_id(id).await?;

        let password_hash = match update.password.as_deref() {
            Some(password) if !password.is_empty() => Some(self.hasher.hash(password)?),
            _ => None,
        };

        let changes = UserChanges {
            name: update.name,
            email: update.email,
            bio: update.bio,
            avatar_url: update.avatar_url,
            password_hash,
        };
        if changes.is_empty() {
            return Ok(current);
        }

        Ok(self.users.update(id, changes).await?)
    }

    /// Delete the caller's own account with its notes and session
    pub async fn delete(&self, id: Uuid, identity: &AuthenticatedIdentity) -> Result<(), AppError> {
        identity.ensure_owner(id, "user")?;
        self.users.get_by_id(id).await?;
        Ok(self.users.delete(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Argon2Hasher, PasswordConfig};
    use blanknotes_core::{MemoryStore, NewUser};

    async fn setup() -> (UserService, Arc<Argon2Hasher>, User, User) {
        let store = Arc::new(MemoryStore::new());
        let hasher = Arc::new(Argon2Hasher::new(PasswordConfig::minimal()));

        let mut created = Vec::new();
        for (name, email) in [("alice", "alice@example.com"), ("bobby", "bob@example.com")] {
            created.push(
                UserRepository::create(
                    store.as_ref(),
                    NewUser {
                        name: name.to_string(),
                        email: email.to_string(),
                        password_hash: hasher.hash("password123").unwrap(),
                    },
                )
                .await
                .unwrap(),
            );
        }
        let bob = created.pop().unwrap();
        let alice = created.pop().unwrap();

        (UserService::new(store, hasher.clone()), hasher, alice, bob)
    }

    fn identity(user: &User) -> AuthenticatedIdentity {
        AuthenticatedIdentity { user_id: user.id }
    }

    #[tokio::test]
    async fn test_update_own_profile() {
        let (service, hasher, alice, _) = setup().await;

        let updated = service
            .update(
                alice.id,
                ProfileUpdate {
                    bio: Some("hello".to_string()),
                    password: Some("new-password".to_string()),
                    ..Default::default()
                },
                &identity(&alice),
            )
            .await
            .unwrap();

        assert_eq!(updated.bio, "hello");
        assert!(hasher.verify("new-password", &updated.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_empty_password_keeps_hash() {
        let (service, _, alice, _) = setup().await;

        let updated = service
            .update(
                alice.id,
                ProfileUpdate {
                    password: Some(String::new()),
                    ..Default::default()
                },
                &identity(&alice),
            )
            .await
            .unwrap();

        assert_eq!(updated.password_hash, alice.password_hash);
    }

    #[tokio::test]
    async fn test_update_other_user_forbidden() {
        let (service, _, alice, bob) = setup().await;

        let result = service
            .update(bob.id, ProfileUpdate::default(), &identity(&alice))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));

        let result = service.delete(bob.id, &identity(&alice)).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_rename_to_taken_name() {
        let (service, _, alice, _) = setup().await;

        let result = service
            .update(
                alice.id,
                ProfileUpdate {
                    name: Some("bobby".to_string()),
                    ..Default::default()
                },
                &identity(&alice),
            )
            .await;
        assert!(matches!(result, Err(AppError::DuplicateName)));
    }

    #[tokio::test]
    async fn test_delete_own_account() {
        let (service, _, alice, _) = setup().await;

        service.delete(alice.id, &identity(&alice)).await.unwrap();
        assert!(matches!(
            service.get(alice.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
