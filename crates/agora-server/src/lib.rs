//! Real-time presence, room chat, and notification push over WebSocket.

pub mod auth;
pub mod connection;
pub mod dispatch;
pub mod health;
pub mod hub;
pub mod registry;
pub mod rooms;
pub mod server;
pub mod session;

pub use auth::{issue_access_token, JwtResolver};
pub use connection::{Connection, Delivery, DropReason, Frame};
pub use dispatch::{Dispatcher, FanOutReport};
pub use hub::{Collaborators, Hub};
pub use registry::ConnectionRegistry;
pub use rooms::RoomTracker;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
