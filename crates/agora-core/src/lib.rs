//! Shared vocabulary for the Agora real-time hub: identifiers, the inbound
//! command and outbound envelope unions, notification payloads, and the
//! collaborator traits the hub consumes.

pub mod collaborators;
pub mod command;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod memory;
pub mod notifications;
pub mod time;

pub use command::Command;
pub use envelope::{DirectMessage, Envelope, UserSummary};
pub use errors::{AuthError, CollaboratorError, FrameError};
pub use ids::{ConnectionId, MessageId, RoomId, UserId};
