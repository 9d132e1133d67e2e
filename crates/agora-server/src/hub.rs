//! The hub: one explicitly constructed object owning the registry, rooms,
//! dispatcher and collaborator handles. Shared as `Arc<Hub>` by the router,
//! every session, and any REST handler that needs to push.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use agora_core::collaborators::{FollowerDirectory, IdentityResolver, MessageStore};
use agora_core::notifications::NotificationPayload;
use agora_core::{AuthError, ConnectionId, DirectMessage, RoomId, UserId};
use agora_telemetry::DeliveryStats;

use crate::connection::{Connection, Delivery, Frame};
use crate::dispatch::{Dispatcher, FanOutReport};
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomTracker;

/// External systems the hub consumes.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityResolver>,
    pub followers: Arc<dyn FollowerDirectory>,
    pub messages: Arc<dyn MessageStore>,
}

pub struct Hub {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomTracker>,
    dispatcher: Dispatcher,
    identity: Arc<dyn IdentityResolver>,
    messages: Arc<dyn MessageStore>,
    max_send_queue: usize,
}

impl Hub {
    pub fn new(collaborators: Collaborators, stats: Arc<DeliveryStats>, max_send_queue: usize) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(stats));
        let rooms = Arc::new(RoomTracker::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&rooms),
            collaborators.followers,
        );
        Self {
            registry,
            rooms,
            dispatcher,
            identity: collaborators.identity,
            messages: collaborators.messages,
            max_send_queue,
        }
    }

    pub async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
        self.identity.resolve(token).await
    }

    /// Allocate a connection for `user` with the configured queue depth.
    /// It is not reachable until passed to [`Hub::connect`].
    pub fn open_connection(&self, user: UserId) -> (Arc<Connection>, mpsc::Receiver<Frame>) {
        Connection::open(user, self.max_send_queue)
    }

    /// Register `conn` and announce the user to their online followers.
    pub async fn connect(&self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        let user = conn.user_id.clone();
        let superseded = self.registry.connect(conn);
        let _ = self.dispatcher.broadcast_online_status(&user, true).await;
        superseded
    }

    /// Unregister `conn_id`. Followers hear about it only if this actually
    /// took the user offline.
    pub async fn disconnect(&self, user: &UserId, conn_id: &ConnectionId) -> bool {
        let removed = self.registry.disconnect(user, conn_id);
        if removed {
            let _ = self.dispatcher.broadcast_online_status(user, false).await;
        }
        removed
    }

    /// Drop `user`'s connection no matter which session owns it.
    pub async fn evict(&self, user: &UserId) -> Option<Arc<Connection>> {
        let evicted = self.registry.evict(user);
        if evicted.is_some() {
            let _ = self.dispatcher.broadcast_online_status(user, false).await;
        }
        evicted
    }

    pub fn notify_user(&self, user: &UserId, notification_type: &str, data: Value) -> Delivery {
        self.dispatcher.notify_user(user, notification_type, data)
    }

    pub fn notify(&self, recipient: &UserId, payload: &NotificationPayload) -> Option<Delivery> {
        self.dispatcher.notify(recipient, payload)
    }

    pub fn send_direct_message(
        &self,
        conversation_id: &str,
        recipient: &UserId,
        message: &DirectMessage,
    ) -> FanOutReport {
        self.dispatcher
            .send_direct_message(conversation_id, recipient, message)
    }

    /// Persist, then fan out. Nothing is broadcast if persistence fails.
    pub async fn post_chat_message(
        &self,
        room: &RoomId,
        sender: &UserId,
        text: &str,
    ) -> Option<FanOutReport> {
        match self.messages.store_message(sender, room.as_str(), text).await {
            Ok(message_id) => {
                info!(room_id = %room, user_id = %sender, message_id = %message_id, "chat message stored");
                Some(self.dispatcher.send_chat_message(room, sender, text))
            }
            Err(e) => {
                warn!(room_id = %room, user_id = %sender, error = %e, "failed to store chat message, not broadcasting");
                None
            }
        }
    }

    pub fn send_typing(&self, room: &RoomId, sender: &UserId) -> FanOutReport {
        self.dispatcher.send_typing(room, sender)
    }

    pub fn join_room(&self, room: &RoomId, user: &UserId) -> bool {
        self.rooms.join(room, user)
    }

    pub fn leave_room(&self, room: &RoomId, user: &UserId) -> bool {
        self.rooms.leave(room, user)
    }

    pub fn room_members(&self, room: &RoomId) -> Vec<UserId> {
        self.rooms.members(room)
    }

    pub fn list_online(&self) -> Vec<UserId> {
        self.registry.list_online()
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.registry.is_online(user)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomTracker {
        &self.rooms
    }

    pub fn stats(&self) -> &Arc<DeliveryStats> {
        self.registry.stats()
    }
}
