//! Inbound frames, decoded once at the socket boundary.
//!
//! Wire shape: `{"type": "ping"|"chat_message"|"join_room"|"leave_room"|"typing",
//! "room_id"?: string, "message"?: string}`. Anything that does not decode
//! into a [`Command`] is ignored by the session loop.

use serde::Deserialize;

use crate::errors::FrameError;
use crate::ids::RoomId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Ping,
    ChatMessage { room_id: RoomId, message: String },
    JoinRoom { room_id: RoomId },
    LeaveRoom { room_id: RoomId },
    Typing { room_id: RoomId },
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    room_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl Command {
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let raw: RawFrame =
            serde_json::from_str(text).map_err(|e| FrameError::Malformed(e.to_string()))?;

        match raw.frame_type.as_str() {
            "ping" => Ok(Self::Ping),
            "chat_message" => {
                let room_id = required(raw.room_id, "chat_message", "room_id")?;
                let message = required(raw.message, "chat_message", "message")?;
                Ok(Self::ChatMessage {
                    room_id: RoomId::from_raw(room_id),
                    message,
                })
            }
            "join_room" => Ok(Self::JoinRoom {
                room_id: RoomId::from_raw(required(raw.room_id, "join_room", "room_id")?),
            }),
            "leave_room" => Ok(Self::LeaveRoom {
                room_id: RoomId::from_raw(required(raw.room_id, "leave_room", "room_id")?),
            }),
            "typing" => Ok(Self::Typing {
                room_id: RoomId::from_raw(required(raw.room_id, "typing", "room_id")?),
            }),
            other => Err(FrameError::UnknownType(other.to_owned())),
        }
    }

    /// Wire name, for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::ChatMessage { .. } => "chat_message",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::Typing { .. } => "typing",
        }
    }
}

// Empty strings count as absent.
fn required(
    value: Option<String>,
    frame_type: &'static str,
    field: &'static str,
) -> Result<String, FrameError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(FrameError::MissingField { frame_type, field }),
    }
}
