//! Seams to the systems the hub consumes but does not own: credential
//! resolution, the follow graph, and message persistence.

use async_trait::async_trait;

use crate::errors::{AuthError, CollaboratorError};
use crate::ids::{MessageId, UserId};

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Map an opaque bearer credential to the user it belongs to.
    async fn resolve(&self, token: &str) -> Result<UserId, AuthError>;
}

#[async_trait]
pub trait FollowerDirectory: Send + Sync {
    /// Every user who follows `user`.
    async fn followers_of(&self, user: &UserId) -> Result<Vec<UserId>, CollaboratorError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message before it is broadcast. `target` is a room id or a
    /// recipient user id.
    async fn store_message(
        &self,
        sender: &UserId,
        target: &str,
        content: &str,
    ) -> Result<MessageId, CollaboratorError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user: &UserId) -> Result<bool, CollaboratorError>;
}
