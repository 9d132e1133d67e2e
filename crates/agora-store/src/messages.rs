use chrono::Utc;
use tracing::instrument;

use agora_core::time::format_timestamp;
use agora_core::{MessageId, UserId};

use crate::database::Database;
use crate::error::StoreError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRow {
    pub id: MessageId,
    pub sender_id: UserId,
    /// Room id for room chat, recipient user id for direct messages.
    pub receiver_id: String,
    pub content: String,
    pub message_type: String,
    pub is_read: bool,
    pub created_at: String,
}

pub struct MessageRepo {
    db: Database,
}

impl MessageRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, content), fields(sender = %sender, target = %target))]
    pub fn insert(
        &self,
        sender: &UserId,
        target: &str,
        content: &str,
    ) -> Result<MessageRow, StoreError> {
        let row = MessageRow {
            id: MessageId::new(),
            sender_id: sender.clone(),
            receiver_id: target.to_string(),
            content: content.to_string(),
            message_type: "text".to_string(),
            is_read: false,
            created_at: format_timestamp(Utc::now()),
        };
        self.db.with_conn(|conn| {
            let _ = conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, content, message_type, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                rusqlite::params![
                    row.id.as_str(),
                    row.sender_id.as_str(),
                    row.receiver_id,
                    row.content,
                    row.message_type,
                    row.created_at,
                ],
            )?;
            Ok(())
        })?;
        Ok(row)
    }

    /// Most recent `limit` messages addressed to `target`, oldest first.
    pub fn list_for_target(&self, target: &str, limit: usize) -> Result<Vec<MessageRow>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, receiver_id, content, message_type, is_read, created_at
                 FROM (
                     SELECT rowid AS seq, * FROM messages WHERE receiver_id = ?1
                     ORDER BY seq DESC LIMIT ?2
                 )
                 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(rusqlite::params![target, limit], |row| {
                Ok(MessageRow {
                    id: MessageId::from_raw(row.get::<_, String>(0)?),
                    sender_id: UserId::from_raw(row.get::<_, String>(1)?),
                    receiver_id: row.get(2)?,
                    content: row.get(3)?,
                    message_type: row.get(4)?,
                    is_read: row.get::<_, i64>(5)? != 0,
                    created_at: row.get(6)?,
                })
            })?;
            Ok(rows.collect::<Result<_, _>>()?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_list_in_order() {
        let repo = MessageRepo::new(Database::in_memory().unwrap());
        let bob = UserId::from_raw("bob");
        for text in ["one", "two", "three"] {
            let _ = repo.insert(&bob, "general", text).unwrap();
        }
        let _ = repo.insert(&bob, "random", "elsewhere").unwrap();

        let rows = repo.list_for_target("general", 10).unwrap();
        let contents: Vec<_> = rows.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);
        assert!(rows.iter().all(|r| r.message_type == "text" && !r.is_read));
    }

    #[test]
    fn limit_keeps_most_recent() {
        let repo = MessageRepo::new(Database::in_memory().unwrap());
        let bob = UserId::from_raw("bob");
        for i in 0..5 {
            let _ = repo.insert(&bob, "general", &format!("m{i}")).unwrap();
        }
        let rows = repo.list_for_target("general", 2).unwrap();
        let contents: Vec<_> = rows.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["m3", "m4"]);
    }

    #[test]
    fn ids_are_prefixed() {
        let repo = MessageRepo::new(Database::in_memory().unwrap());
        let row = repo.insert(&UserId::from_raw("bob"), "general", "hi").unwrap();
        assert!(row.id.as_str().starts_with("msg_"));
    }
}
