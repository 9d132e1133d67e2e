//! In-process collaborator implementations for tests and embedded use.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::collaborators::{FollowerDirectory, IdentityResolver, MessageStore, UserDirectory};
use crate::errors::{AuthError, CollaboratorError};
use crate::ids::{MessageId, UserId};

/// Fixed token table: each token resolves to exactly one user.
#[derive(Default)]
pub struct StaticTokens {
    tokens: RwLock<HashMap<String, UserId>>,
}

impl StaticTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: impl Into<String>, user: impl Into<String>) -> Self {
        self.insert(token, user);
        self
    }

    pub fn insert(&self, token: impl Into<String>, user: impl Into<String>) {
        let _ = self
            .tokens
            .write()
            .insert(token.into(), UserId::from_raw(user.into()));
    }
}

#[async_trait]
impl IdentityResolver for StaticTokens {
    async fn resolve(&self, token: &str) -> Result<UserId, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Missing);
        }
        self.tokens
            .read()
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::Invalid("unknown token".into()))
    }
}

#[async_trait]
impl UserDirectory for StaticTokens {
    async fn user_exists(&self, user: &UserId) -> Result<bool, CollaboratorError> {
        Ok(self.tokens.read().values().any(|u| u == user))
    }
}

/// Follow graph keyed by the followed user.
#[derive(Default)]
pub struct InMemoryFollows {
    followers: RwLock<HashMap<UserId, HashSet<UserId>>>,
}

impl InMemoryFollows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `follower` follows `following`.
    pub fn follow(&self, follower: &str, following: &str) {
        let _ = self
            .followers
            .write()
            .entry(UserId::from_raw(following))
            .or_default()
            .insert(UserId::from_raw(follower));
    }

    pub fn unfollow(&self, follower: &str, following: &str) {
        if let Some(set) = self.followers.write().get_mut(following) {
            let _ = set.remove(follower);
        }
    }
}

#[async_trait]
impl FollowerDirectory for InMemoryFollows {
    async fn followers_of(&self, user: &UserId) -> Result<Vec<UserId>, CollaboratorError> {
        let mut followers: Vec<UserId> = self
            .followers
            .read()
            .get(user)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        followers.sort();
        Ok(followers)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub sender: UserId,
    pub target: String,
    pub content: String,
}

/// Append-only message log. `fail_writes` simulates an unavailable database.
#[derive(Default)]
pub struct InMemoryMessages {
    messages: RwLock<Vec<StoredMessage>>,
    fail_writes: RwLock<bool>,
}

impl InMemoryMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write() = fail;
    }

    pub fn messages(&self) -> Vec<StoredMessage> {
        self.messages.read().clone()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessages {
    async fn store_message(
        &self,
        sender: &UserId,
        target: &str,
        content: &str,
    ) -> Result<MessageId, CollaboratorError> {
        if *self.fail_writes.read() {
            return Err(CollaboratorError::Unavailable("writes disabled".into()));
        }
        let id = MessageId::new();
        self.messages.write().push(StoredMessage {
            id: id.clone(),
            sender: sender.clone(),
            target: target.to_owned(),
            content: content.to_owned(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_tokens_resolve() {
        let tokens = StaticTokens::new().with_token("tok-a", "alice-id");
        assert_eq!(tokens.resolve("tok-a").await.unwrap(), UserId::from_raw("alice-id"));
        assert!(matches!(tokens.resolve("nope").await, Err(AuthError::Invalid(_))));
        assert_eq!(tokens.resolve("").await, Err(AuthError::Missing));
    }

    #[tokio::test]
    async fn static_tokens_know_their_users() {
        let tokens = StaticTokens::new().with_token("tok-a", "alice-id");
        assert!(tokens.user_exists(&UserId::from_raw("alice-id")).await.unwrap());
        assert!(!tokens.user_exists(&UserId::from_raw("bob-id")).await.unwrap());
    }

    #[tokio::test]
    async fn follows_are_directional() {
        let follows = InMemoryFollows::new();
        follows.follow("bob-id", "alice-id");
        follows.follow("carol-id", "alice-id");

        let alice = follows.followers_of(&UserId::from_raw("alice-id")).await.unwrap();
        assert_eq!(alice, vec![UserId::from_raw("bob-id"), UserId::from_raw("carol-id")]);

        let bob = follows.followers_of(&UserId::from_raw("bob-id")).await.unwrap();
        assert!(bob.is_empty());

        follows.unfollow("bob-id", "alice-id");
        let alice = follows.followers_of(&UserId::from_raw("alice-id")).await.unwrap();
        assert_eq!(alice, vec![UserId::from_raw("carol-id")]);
    }

    #[tokio::test]
    async fn messages_append_and_fail_on_demand() {
        let store = InMemoryMessages::new();
        let sender = UserId::from_raw("bob-id");
        let id = store.store_message(&sender, "general", "hello").await.unwrap();
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].id, id);

        store.set_fail_writes(true);
        assert!(store.store_message(&sender, "general", "again").await.is_err());
        assert_eq!(store.messages().len(), 1);
    }
}
