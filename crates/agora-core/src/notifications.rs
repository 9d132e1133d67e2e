//! Notification payloads built by the REST layer after it commits a like,
//! comment, or follow. The hub only delivers them.

use serde::Serialize;
use serde_json::{json, Value};

use crate::envelope::UserSummary;
use crate::ids::UserId;
use crate::time::timestamp_now;

/// Max chars of a comment carried in the `comment.content` preview.
pub const COMMENT_PREVIEW_CHARS: usize = 50;
/// Max chars of a comment quoted inside the human-readable message.
pub const MESSAGE_QUOTE_CHARS: usize = 30;

const ELLIPSIS: &str = "...";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
        }
    }
}

/// Post reference embedded in like/comment notifications.
#[derive(Clone, Debug, Serialize)]
pub struct PostRef {
    pub id: String,
    pub post_image: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    /// Who caused the notification. Self-actions are never delivered.
    pub actor: UserId,
    pub data: Value,
}

impl NotificationPayload {
    pub fn like(actor: &UserSummary, post: PostRef) -> Self {
        Self {
            kind: NotificationKind::Like,
            actor: actor.id.clone(),
            data: json!({
                "user": actor,
                "post": post,
                "message": format!("{} liked your post.", actor.username),
                "created_at": timestamp_now(),
            }),
        }
    }

    pub fn comment(actor: &UserSummary, post: PostRef, content: &str) -> Self {
        Self {
            kind: NotificationKind::Comment,
            actor: actor.id.clone(),
            data: json!({
                "user": actor,
                "post": post,
                "comment": {
                    "content": truncate_preview(content, COMMENT_PREVIEW_CHARS),
                },
                "message": format!(
                    "{} commented: \"{}\"",
                    actor.username,
                    truncate_preview(content, MESSAGE_QUOTE_CHARS)
                ),
                "created_at": timestamp_now(),
            }),
        }
    }

    pub fn follow(actor: &UserSummary) -> Self {
        Self {
            kind: NotificationKind::Follow,
            actor: actor.id.clone(),
            data: json!({
                "user": actor,
                "message": format!("{} started following you.", actor.username),
                "created_at": timestamp_now(),
            }),
        }
    }

    pub fn is_self_action(&self, recipient: &UserId) -> bool {
        &self.actor == recipient
    }
}

/// Cut `text` to at most `max_chars` characters, appending `...` when cut.
/// Counts chars, not bytes, so multi-byte text never splits mid-character.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((boundary, _)) => format!("{}{ELLIPSIS}", &text[..boundary]),
        None => text.to_owned(),
    }
}
