//! SQLite persistence for users, follow edges, and chat messages.

pub mod collaborators;
pub mod database;
pub mod error;
pub mod follows;
pub mod messages;
pub mod schema;
pub mod users;

pub use collaborators::SqliteCollaborators;
pub use database::Database;
pub use error::StoreError;
pub use follows::FollowRepo;
pub use messages::{MessageRepo, MessageRow};
pub use users::{UserRepo, UserRow};
