//! Which users are reachable right now, and through which connection.
//!
//! At most one connection per user. The online set is the key set of the
//! map, so the two can never disagree.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use agora_core::{ConnectionId, Envelope, UserId};
use agora_telemetry::DeliveryStats;

use crate::connection::{Connection, Delivery, DropReason, Frame};

pub struct ConnectionRegistry {
    active: DashMap<UserId, Arc<Connection>>,
    stats: Arc<DeliveryStats>,
}

impl ConnectionRegistry {
    pub fn new(stats: Arc<DeliveryStats>) -> Self {
        Self {
            active: DashMap::new(),
            stats,
        }
    }

    /// Make `conn` the active connection for its user. Returns the
    /// connection it superseded, which is left open.
    pub fn connect(&self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        let user = conn.user_id.clone();
        let conn_id = conn.id.clone();
        let previous = self.active.insert(user.clone(), conn);
        match &previous {
            Some(old) => info!(
                user_id = %user,
                conn_id = %conn_id,
                superseded = %old.id,
                "connection superseded"
            ),
            None => info!(user_id = %user, conn_id = %conn_id, "user online"),
        }
        previous
    }

    /// Remove `user` only if `conn_id` is still their active connection.
    /// A session that was superseded cannot evict its successor.
    pub fn disconnect(&self, user: &UserId, conn_id: &ConnectionId) -> bool {
        let removed = self
            .active
            .remove_if(user, |_, conn| &conn.id == conn_id)
            .is_some();
        if removed {
            info!(user_id = %user, conn_id = %conn_id, "user offline");
        } else {
            debug!(user_id = %user, conn_id = %conn_id, "disconnect ignored, not the active connection");
        }
        removed
    }

    /// Remove whatever connection `user` has, regardless of which session
    /// asks.
    pub fn evict(&self, user: &UserId) -> Option<Arc<Connection>> {
        let removed = self.active.remove(user).map(|(_, conn)| conn);
        if let Some(conn) = &removed {
            info!(user_id = %user, conn_id = %conn.id, "connection evicted");
        }
        removed
    }

    pub fn get(&self, user: &UserId) -> Option<Arc<Connection>> {
        self.active.get(user).map(|entry| Arc::clone(entry.value()))
    }

    /// Serialize `envelope` and deliver it to `user`'s active connection.
    pub fn send_to_user(&self, user: &UserId, envelope: &Envelope) -> Delivery {
        match encode(envelope) {
            Some(frame) => self.send_frame(user, frame),
            None => {
                self.stats.record_dropped(DropReason::Encode);
                Delivery::Dropped(DropReason::Encode)
            }
        }
    }

    /// Deliver an already-serialized frame. Fan-out paths encode once and
    /// call this per recipient.
    pub fn send_frame(&self, user: &UserId, frame: Frame) -> Delivery {
        // Clone the handle so the shard lock is not held across the send.
        let delivery = match self.get(user) {
            Some(conn) => conn.send(frame),
            None => Delivery::Dropped(DropReason::Offline),
        };
        match delivery {
            Delivery::Delivered => self.stats.record_delivered(),
            Delivery::Dropped(reason) => {
                self.stats.record_dropped(reason);
                match reason {
                    DropReason::Offline => debug!(user_id = %user, "recipient offline, dropping"),
                    _ => warn!(user_id = %user, ?reason, "delivery failed"),
                }
            }
        }
        delivery
    }

    /// Snapshot of online users, sorted.
    pub fn list_online(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.active.iter().map(|e| e.key().clone()).collect();
        users.sort();
        users
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.active.contains_key(user)
    }

    pub fn connection_count(&self) -> usize {
        self.active.len()
    }

    pub fn stats(&self) -> &Arc<DeliveryStats> {
        &self.stats
    }
}

/// Serialize an envelope into a shareable frame.
pub(crate) fn encode(envelope: &Envelope) -> Option<Frame> {
    match envelope.to_json() {
        Ok(json) => Some(Frame::from(json)),
        Err(e) => {
            tracing::error!(kind = envelope.kind(), error = %e, "failed to encode envelope");
            None
        }
    }
}
