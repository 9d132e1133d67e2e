use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, RoomId, UserId};
use crate::time::timestamp_now;

/// Outbound event pushed over a live connection. Carries enough denormalized
/// data for the client to render without a follow-up fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    OnlineStatus {
        user_id: UserId,
        is_online: bool,
        timestamp: String,
    },
    Notification {
        notification_type: String,
        data: serde_json::Value,
        timestamp: String,
    },
    NewMessage {
        conversation_id: String,
        message: DirectMessage,
    },
    ChatMessage {
        room_id: RoomId,
        sender_id: UserId,
        message: String,
        timestamp: String,
    },
    UserTyping {
        user_id: UserId,
        room_id: RoomId,
    },
    InitialData {
        online_users: Vec<UserId>,
        user_id: UserId,
    },
    Pong,
}

impl Envelope {
    pub fn online_status(user_id: UserId, is_online: bool) -> Self {
        Self::OnlineStatus {
            user_id,
            is_online,
            timestamp: timestamp_now(),
        }
    }

    pub fn notification(notification_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self::Notification {
            notification_type: notification_type.into(),
            data,
            timestamp: timestamp_now(),
        }
    }

    pub fn chat_message(room_id: RoomId, sender_id: UserId, message: impl Into<String>) -> Self {
        Self::ChatMessage {
            room_id,
            sender_id,
            message: message.into(),
            timestamp: timestamp_now(),
        }
    }

    /// Discriminator as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OnlineStatus { .. } => "online_status",
            Self::Notification { .. } => "notification",
            Self::NewMessage { .. } => "new_message",
            Self::ChatMessage { .. } => "chat_message",
            Self::UserTyping { .. } => "user_typing",
            Self::InitialData { .. } => "initial_data",
            Self::Pong => "pong",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Actor summary embedded in notifications and direct messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub profile_picture: Option<String>,
}

/// A persisted one-to-one message as rendered for one side of the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    pub id: MessageId,
    pub content: String,
    pub message_type: String,
    pub sender: UserSummary,
    /// Viewer-relative: true on the sender's copy.
    pub is_own: bool,
    pub is_read: bool,
    pub created_at: String,
}

impl DirectMessage {
    pub fn for_viewer(&self, is_own: bool) -> Self {
        Self {
            is_own,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(envelope: &Envelope) -> Value {
        serde_json::from_str(&envelope.to_json().unwrap()).unwrap()
    }

    #[test]
    fn pong_is_bare_type() {
        assert_eq!(Envelope::Pong.to_json().unwrap(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn chat_message_shape() {
        let v = to_value(&Envelope::chat_message(
            RoomId::from_raw("general"),
            UserId::from_raw("bob-id"),
            "hello",
        ));
        assert_eq!(v["type"], "chat_message");
        assert_eq!(v["room_id"], "general");
        assert_eq!(v["sender_id"], "bob-id");
        assert_eq!(v["message"], "hello");
        assert!(v["timestamp"].is_string());
    }

    #[test]
    fn online_status_shape() {
        let v = to_value(&Envelope::online_status(UserId::from_raw("alice-id"), true));
        assert_eq!(v["type"], "online_status");
        assert_eq!(v["user_id"], "alice-id");
        assert_eq!(v["is_online"], true);
    }

    #[test]
    fn notification_nests_data() {
        let v = to_value(&Envelope::notification("like", json!({"post": {"id": "p1"}})));
        assert_eq!(v["type"], "notification");
        assert_eq!(v["notification_type"], "like");
        assert_eq!(v["data"]["post"]["id"], "p1");
    }

    #[test]
    fn initial_data_lists_users() {
        let v = to_value(&Envelope::InitialData {
            online_users: vec![UserId::from_raw("a"), UserId::from_raw("b")],
            user_id: UserId::from_raw("a"),
        });
        assert_eq!(v, json!({"type": "initial_data", "online_users": ["a", "b"], "user_id": "a"}));
    }

    #[test]
    fn typing_has_no_timestamp() {
        let v = to_value(&Envelope::UserTyping {
            user_id: UserId::from_raw("a"),
            room_id: RoomId::from_raw("r"),
        });
        assert_eq!(v, json!({"type": "user_typing", "user_id": "a", "room_id": "r"}));
    }

    #[test]
    fn direct_message_viewer_copy() {
        let msg = DirectMessage {
            id: MessageId::from_raw("m1"),
            content: "hey".into(),
            message_type: "text".into(),
            sender: UserSummary {
                id: UserId::from_raw("a"),
                username: "alice".into(),
                profile_picture: None,
            },
            is_own: false,
            is_read: false,
            created_at: "2024-01-01T00:00:00.000000".into(),
        };
        let own = msg.for_viewer(true);
        assert!(own.is_own);
        assert_eq!(own.content, msg.content);

        let v = to_value(&Envelope::NewMessage {
            conversation_id: "c1".into(),
            message: own,
        });
        assert_eq!(v["type"], "new_message");
        assert_eq!(v["message"]["sender"]["username"], "alice");
        assert_eq!(v["message"]["is_own"], true);
    }

    #[test]
    fn kind_matches_wire_tag() {
        let envelopes = [
            Envelope::Pong,
            Envelope::online_status(UserId::from_raw("a"), false),
            Envelope::notification("follow", json!({})),
            Envelope::chat_message(RoomId::from_raw("r"), UserId::from_raw("a"), "x"),
        ];
        for envelope in &envelopes {
            assert_eq!(to_value(envelope)["type"], envelope.kind());
        }
    }
}
