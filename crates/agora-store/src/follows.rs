use chrono::Utc;
use tracing::instrument;

use agora_core::UserId;

use crate::database::Database;
use crate::error::StoreError;

/// Directed follow edges: `follower_id` follows `following_id`.
pub struct FollowRepo {
    db: Database,
}

impl FollowRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns false when the edge already existed.
    #[instrument(skip(self), fields(follower = %follower, following = %following))]
    pub fn follow(&self, follower: &UserId, following: &UserId) -> Result<bool, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO follows (follower_id, following_id, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![follower.as_str(), following.as_str(), now],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn unfollow(&self, follower: &UserId, following: &UserId) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                [follower.as_str(), following.as_str()],
            )?;
            Ok(removed == 1)
        })
    }

    /// Everyone who follows `user`, ordered by id.
    pub fn followers_of(&self, user: &UserId) -> Result<Vec<UserId>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT follower_id FROM follows WHERE following_id = ?1 ORDER BY follower_id",
            )?;
            let rows = stmt.query_map([user.as_str()], |row| row.get::<_, String>(0))?;
            let mut followers = Vec::new();
            for row in rows {
                followers.push(UserId::from_raw(row?));
            }
            Ok(followers)
        })
    }
}
