use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::instrument;

use agora_core::{UserId, UserSummary};

use crate::database::Database;
use crate::error::StoreError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRow {
    pub id: UserId,
    pub username: String,
    pub profile_picture: Option<String>,
    pub created_at: String,
}

impl UserRow {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            profile_picture: self.profile_picture.clone(),
        }
    }
}

pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, profile_picture), fields(user_id = %id))]
    pub fn create(
        &self,
        id: &UserId,
        username: &str,
        profile_picture: Option<&str>,
    ) -> Result<UserRow, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let _ = conn.execute(
                "INSERT INTO users (id, username, profile_picture, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.as_str(), username, profile_picture, now],
            )?;
            Ok(UserRow {
                id: id.clone(),
                username: username.to_string(),
                profile_picture: profile_picture.map(str::to_string),
                created_at: now,
            })
        })
    }

    pub fn get(&self, id: &UserId) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, profile_picture, created_at FROM users WHERE id = ?1",
                [id.as_str()],
                |row| {
                    Ok(UserRow {
                        id: UserId::from_raw(row.get::<_, String>(0)?),
                        username: row.get(1)?,
                        profile_picture: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
        })
    }

    pub fn exists(&self, id: &UserId) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [id.as_str()], |_| Ok(()))
                .optional()?
                .is_some())
        })
    }
}
