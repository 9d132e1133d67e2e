//! Room membership, independent of whether members are connected.

use std::collections::HashSet;

use dashmap::DashMap;
use tracing::debug;

use agora_core::{RoomId, UserId};

#[derive(Default)]
pub struct RoomTracker {
    rooms: DashMap<RoomId, HashSet<UserId>>,
}

impl RoomTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `user` was not already a member.
    pub fn join(&self, room: &RoomId, user: &UserId) -> bool {
        let added = self
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(user.clone());
        debug!(room_id = %room, user_id = %user, added, "join room");
        added
    }

    /// Returns true if `user` was a member. An emptied room is removed.
    pub fn leave(&self, room: &RoomId, user: &UserId) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(mut members) => members.remove(user),
            None => false,
        };
        // Re-checked under the shard lock so a concurrent join is not lost.
        let _ = self.rooms.remove_if(room, |_, members| members.is_empty());
        debug!(room_id = %room, user_id = %user, removed, "leave room");
        removed
    }

    /// Members of `room`, sorted. Empty for unknown rooms.
    pub fn members(&self, room: &RoomId) -> Vec<UserId> {
        let mut members: Vec<UserId> = self
            .rooms
            .get(room)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    pub fn contains(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
