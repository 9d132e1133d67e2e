//! SQLite-backed implementations of the hub's collaborator traits. Every
//! call hops to the blocking pool so the runtime threads never wait on disk.

use async_trait::async_trait;

use agora_core::collaborators::{FollowerDirectory, MessageStore, UserDirectory};
use agora_core::{CollaboratorError, MessageId, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::follows::FollowRepo;
use crate::messages::MessageRepo;
use crate::users::UserRepo;

#[derive(Clone)]
pub struct SqliteCollaborators {
    db: Database,
}

impl SqliteCollaborators {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db)).await?
    }
}

#[async_trait]
impl FollowerDirectory for SqliteCollaborators {
    async fn followers_of(&self, user: &UserId) -> Result<Vec<UserId>, CollaboratorError> {
        let user = user.clone();
        Ok(self
            .blocking(move |db| FollowRepo::new(db).followers_of(&user))
            .await?)
    }
}

#[async_trait]
impl MessageStore for SqliteCollaborators {
    async fn store_message(
        &self,
        sender: &UserId,
        target: &str,
        content: &str,
    ) -> Result<MessageId, CollaboratorError> {
        let sender = sender.clone();
        let target = target.to_owned();
        let content = content.to_owned();
        let row = self
            .blocking(move |db| MessageRepo::new(db).insert(&sender, &target, &content))
            .await?;
        Ok(row.id)
    }
}

#[async_trait]
impl UserDirectory for SqliteCollaborators {
    async fn user_exists(&self, user: &UserId) -> Result<bool, CollaboratorError> {
        let user = user.clone();
        Ok(self.blocking(move |db| UserRepo::new(db).exists(&user)).await?)
    }
}
