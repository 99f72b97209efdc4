use serde::{Deserialize, Serialize};

use crate::murmur::Murmur;
use crate::murmur::backend::{Document, Fields, Query, SetMode};
use crate::murmur::error::{MurmurError, Result};
use crate::types::UserId;

pub(crate) const USERS_COLLECTION: &str = "users";

/// Public profile of a registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub email: Option<String>,
    pub profile_picture: Option<String>,
}

impl User {
    pub fn from_document(document: &Document) -> Self {
        Self {
            id: UserId::new(document.id.as_str()),
            display_name: document.get_str("displayName").unwrap_or_default().to_string(),
            email: document.get_str("email").map(str::to_string),
            profile_picture: document.get_str("profilePicture").map(str::to_string),
        }
    }
}

impl Murmur {
    /// Looks a user up by the exact email address they registered with.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim();
        if email.is_empty() {
            return Err(MurmurError::InvalidInput("email must not be empty".to_string()));
        }

        let documents = self
            .store()
            .fetch_once(Query::collection(USERS_COLLECTION).where_eq("email", email).limit(1))
            .await?;

        Ok(documents.first().map(User::from_document))
    }

    pub async fn find_user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self
            .store()
            .get_document(USERS_COLLECTION, user_id.as_str())
            .await?
            .as_ref()
            .map(User::from_document))
    }

    /// Publishes the signed-in user's display name and email so others can
    /// find them. Existing profile fields are kept.
    pub async fn publish_profile(&self) -> Result<User> {
        let identity = self.session().identity()?;

        let mut fields = Fields::new();
        fields.insert("displayName".to_string(), identity.display_name.as_str().into());
        if let Some(email) = &identity.email {
            fields.insert("email".to_string(), email.as_str().into());
        }

        self.store()
            .set_document(USERS_COLLECTION, identity.id.as_str(), fields, SetMode::Merge)
            .await?;

        tracing::debug!(target: "murmur::users::publish_profile", "Published profile for {}", identity.id);

        self.find_user(&identity.id).await?.ok_or(MurmurError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::murmur::test_utils::*;

    #[tokio::test]
    async fn published_profile_is_found_by_email() {
        let (murmur, _store, _logs) = create_mock_murmur();

        let published = murmur.publish_profile().await.unwrap();
        assert_eq!(published.display_name, "Alice");

        let found = murmur
            .find_user_by_email(" alice@example.com ")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, UserId::new("alice"));
        assert_eq!(found, published);
    }

    #[tokio::test]
    async fn unknown_email_finds_nothing() {
        let (murmur, store, _logs) = create_mock_murmur();
        seed_user(&store, &bob()).await;

        assert!(murmur.find_user_by_email("carol@example.com").await.unwrap().is_none());
        assert!(murmur.find_user_by_email("").await.is_err());
    }

    #[tokio::test]
    async fn find_user_by_id() {
        let (murmur, store, _logs) = create_mock_murmur();
        seed_user(&store, &bob()).await;

        let bob = murmur.find_user(&UserId::new("bob")).await.unwrap().unwrap();
        assert_eq!(bob.display_name, "Bob");
        assert!(bob.profile_picture.is_none());
        assert!(murmur.find_user(&UserId::new("nobody")).await.unwrap().is_none());
    }
}
