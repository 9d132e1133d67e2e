//! Fan-out: resolve the recipients of one logical event and push to each.
//!
//! Every path absorbs per-recipient failures. The returned [`FanOutReport`]
//! says what happened; callers are free to drop it.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use agora_core::collaborators::FollowerDirectory;
use agora_core::notifications::NotificationPayload;
use agora_core::{DirectMessage, Envelope, RoomId, UserId};

use crate::connection::Delivery;
use crate::registry::{encode, ConnectionRegistry};
use crate::rooms::RoomTracker;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub attempted: usize,
    pub delivered: usize,
    pub dropped: usize,
}

impl FanOutReport {
    fn record(&mut self, delivery: Delivery) {
        self.attempted += 1;
        match delivery {
            Delivery::Delivered => self.delivered += 1,
            Delivery::Dropped(_) => self.dropped += 1,
        }
    }
}

pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomTracker>,
    followers: Arc<dyn FollowerDirectory>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<RoomTracker>,
        followers: Arc<dyn FollowerDirectory>,
    ) -> Self {
        Self {
            registry,
            rooms,
            followers,
        }
    }

    /// Wrap `data` in a `notification` envelope for one user.
    pub fn notify_user(&self, user: &UserId, notification_type: &str, data: Value) -> Delivery {
        self.registry
            .send_to_user(user, &Envelope::notification(notification_type, data))
    }

    /// Deliver a prebuilt notification. Returns `None` when `recipient` is
    /// the actor, who is never notified about their own action.
    pub fn notify(&self, recipient: &UserId, payload: &NotificationPayload) -> Option<Delivery> {
        if payload.is_self_action(recipient) {
            debug!(user_id = %recipient, kind = payload.kind.as_str(), "skipping self notification");
            return None;
        }
        Some(self.notify_user(recipient, payload.kind.as_str(), payload.data.clone()))
    }

    /// Tell every online follower of `user` about a presence change.
    pub async fn broadcast_online_status(&self, user: &UserId, is_online: bool) -> FanOutReport {
        let followers = match self.followers.followers_of(user).await {
            Ok(followers) => followers,
            Err(e) => {
                warn!(user_id = %user, error = %e, "follower lookup failed, skipping presence broadcast");
                return FanOutReport::default();
            }
        };

        let online: Vec<UserId> = followers
            .into_iter()
            .filter(|f| self.registry.is_online(f))
            .collect();
        if online.is_empty() {
            return FanOutReport::default();
        }

        let envelope = Envelope::online_status(user.clone(), is_online);
        let report = self.fan_out(&envelope, online.iter());
        debug!(user_id = %user, is_online, ?report, "presence broadcast");
        report
    }

    /// `chat_message` to every member of `room`, the sender's echo included.
    pub fn send_chat_message(&self, room: &RoomId, sender: &UserId, text: &str) -> FanOutReport {
        let members = self.rooms.members(room);
        let envelope = Envelope::chat_message(room.clone(), sender.clone(), text);
        let report = self.fan_out(&envelope, members.iter());
        debug!(room_id = %room, sender = %sender, ?report, "chat fan-out");
        report
    }

    /// `user_typing` to every member of `room` except the typist.
    pub fn send_typing(&self, room: &RoomId, sender: &UserId) -> FanOutReport {
        let members = self.rooms.members(room);
        let envelope = Envelope::UserTyping {
            user_id: sender.clone(),
            room_id: room.clone(),
        };
        self.fan_out(&envelope, members.iter().filter(|m| *m != sender))
    }

    /// Push a persisted direct message to both sides of the conversation,
    /// each with its own `is_own` flag.
    pub fn send_direct_message(
        &self,
        conversation_id: &str,
        recipient: &UserId,
        message: &DirectMessage,
    ) -> FanOutReport {
        let mut report = FanOutReport::default();
        let copies = [
            (recipient, message.for_viewer(false)),
            (&message.sender.id, message.for_viewer(true)),
        ];
        for (viewer, copy) in copies {
            let envelope = Envelope::NewMessage {
                conversation_id: conversation_id.to_owned(),
                message: copy,
            };
            report.record(self.registry.send_to_user(viewer, &envelope));
        }
        report
    }

    fn fan_out<'a>(
        &self,
        envelope: &Envelope,
        recipients: impl Iterator<Item = &'a UserId>,
    ) -> FanOutReport {
        let mut report = FanOutReport::default();
        let Some(frame) = encode(envelope) else {
            return report;
        };
        for user in recipients {
            report.record(self.registry.send_frame(user, frame.clone()));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::memory::InMemoryFollows;
    use agora_core::{CollaboratorError, MessageId, UserSummary};
    use agora_telemetry::DeliveryStats;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::connection::{Connection, DropReason, Frame};

    struct Harness {
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<RoomTracker>,
        follows: Arc<InMemoryFollows>,
        dispatcher: Dispatcher,
    }

    fn harness() -> Harness {
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(DeliveryStats::new())));
        let rooms = Arc::new(RoomTracker::new());
        let follows = Arc::new(InMemoryFollows::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&rooms),
            Arc::clone(&follows) as Arc<dyn FollowerDirectory>,
        );
        Harness {
            registry,
            rooms,
            follows,
            dispatcher,
        }
    }

    impl Harness {
        fn online(&self, user: &str) -> mpsc::Receiver<Frame> {
            let (conn, rx) = Connection::open(UserId::from_raw(user), 16);
            let _ = self.registry.connect(conn);
            rx
        }
    }

    fn next_json(rx: &mut mpsc::Receiver<Frame>) -> Value {
        let frame = rx.try_recv().expect("expected a frame");
        serde_json::from_str(&frame).unwrap()
    }

    fn user(s: &str) -> UserId {
        UserId::from_raw(s)
    }

    fn room(s: &str) -> RoomId {
        RoomId::from_raw(s)
    }

    #[test]
    fn fan_out_shares_one_encoded_buffer() {
        let h = harness();
        let mut alice = h.online("alice");
        let mut bob = h.online("bob");
        let _ = h.rooms.join(&room("general"), &user("alice"));
        let _ = h.rooms.join(&room("general"), &user("bob"));

        let _ = h.dispatcher.send_chat_message(&room("general"), &user("alice"), "hi");
        let a = alice.try_recv().unwrap();
        let b = bob.try_recv().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().as_ptr(), b.as_str().as_ptr());
    }

    #[test]
    fn chat_reaches_members_including_sender() {
        let h = harness();
        let mut alice = h.online("alice");
        let mut bob = h.online("bob");
        let _ = h.rooms.join(&room("general"), &user("alice"));
        let _ = h.rooms.join(&room("general"), &user("bob"));

        let report = h.dispatcher.send_chat_message(&room("general"), &user("bob"), "hello");
        assert_eq!(report, FanOutReport { attempted: 2, delivered: 2, dropped: 0 });

        let v = next_json(&mut alice);
        assert_eq!(v["type"], "chat_message");
        assert_eq!(v["sender_id"], "bob");
        assert_eq!(v["message"], "hello");
        assert_eq!(next_json(&mut bob)["type"], "chat_message");
    }

    #[test]
    fn chat_is_isolated_by_room() {
        let h = harness();
        let mut a = h.online("a");
        let mut b = h.online("b");
        let _ = h.rooms.join(&room("r1"), &user("a"));
        let _ = h.rooms.join(&room("r2"), &user("b"));

        let _ = h.dispatcher.send_chat_message(&room("r1"), &user("a"), "hi");
        assert_eq!(next_json(&mut a)["room_id"], "r1");
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn failing_member_does_not_block_others() {
        let h = harness();
        let broken = h.online("broken");
        let mut healthy = h.online("healthy");
        drop(broken);
        let _ = h.rooms.join(&room("r"), &user("broken"));
        let _ = h.rooms.join(&room("r"), &user("healthy"));

        let report = h.dispatcher.send_chat_message(&room("r"), &user("healthy"), "still here");
        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(next_json(&mut healthy)["message"], "still here");
    }

    #[test]
    fn offline_member_is_a_silent_drop() {
        let h = harness();
        let _ = h.rooms.join(&room("r"), &user("ghost"));
        let report = h.dispatcher.send_chat_message(&room("r"), &user("x"), "anyone?");
        assert_eq!(report.dropped, 1);
        // Membership outlives connectivity.
        assert_eq!(h.rooms.members(&room("r")), vec![user("ghost")]);
    }

    #[test]
    fn typing_skips_sender() {
        let h = harness();
        let mut alice = h.online("alice");
        let mut bob = h.online("bob");
        let _ = h.rooms.join(&room("general"), &user("alice"));
        let _ = h.rooms.join(&room("general"), &user("bob"));

        let report = h.dispatcher.send_typing(&room("general"), &user("bob"));
        assert_eq!(report.attempted, 1);
        let v = next_json(&mut alice);
        assert_eq!(v["type"], "user_typing");
        assert_eq!(v["user_id"], "bob");
        assert!(bob.try_recv().is_err());
    }

    #[test]
    fn typing_in_unknown_room_sends_nothing() {
        let h = harness();
        let report = h.dispatcher.send_typing(&room("nowhere"), &user("bob"));
        assert_eq!(report, FanOutReport::default());
    }

    #[tokio::test]
    async fn presence_goes_to_online_followers_only() {
        let h = harness();
        h.follows.follow("bob", "alice");
        h.follows.follow("carol", "alice");
        let mut bob = h.online("bob");

        let report = h.dispatcher.broadcast_online_status(&user("alice"), true).await;
        assert_eq!(report, FanOutReport { attempted: 1, delivered: 1, dropped: 0 });
        let v = next_json(&mut bob);
        assert_eq!(v["type"], "online_status");
        assert_eq!(v["user_id"], "alice");
        assert_eq!(v["is_online"], true);
    }

    #[tokio::test]
    async fn presence_not_sent_to_non_followers() {
        let h = harness();
        let mut dave = h.online("dave");
        let _ = h.dispatcher.broadcast_online_status(&user("alice"), true).await;
        assert!(dave.try_recv().is_err());
    }

    struct FailingFollows;

    #[async_trait]
    impl FollowerDirectory for FailingFollows {
        async fn followers_of(&self, _: &UserId) -> Result<Vec<UserId>, CollaboratorError> {
            Err(CollaboratorError::Unavailable("db down".into()))
        }
    }

    #[tokio::test]
    async fn follower_lookup_failure_is_absorbed() {
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(DeliveryStats::new())));
        let dispatcher = Dispatcher::new(
            registry,
            Arc::new(RoomTracker::new()),
            Arc::new(FailingFollows),
        );
        let report = dispatcher.broadcast_online_status(&user("alice"), false).await;
        assert_eq!(report, FanOutReport::default());
    }

    #[test]
    fn notify_user_wraps_data() {
        let h = harness();
        let mut alice = h.online("alice");
        let delivery = h
            .dispatcher
            .notify_user(&user("alice"), "like", serde_json::json!({"post": {"id": "p1"}}));
        assert!(delivery.is_delivered());
        let v = next_json(&mut alice);
        assert_eq!(v["type"], "notification");
        assert_eq!(v["notification_type"], "like");
        assert_eq!(v["data"]["post"]["id"], "p1");
        assert!(v["timestamp"].is_string());
    }

    #[test]
    fn notify_user_offline_is_dropped() {
        let h = harness();
        let delivery = h.dispatcher.notify_user(&user("nobody"), "follow", Value::Null);
        assert_eq!(delivery, Delivery::Dropped(DropReason::Offline));
    }

    #[test]
    fn notify_skips_self_action() {
        let h = harness();
        let mut alice = h.online("alice");
        let actor = UserSummary {
            id: user("alice"),
            username: "alice".into(),
            profile_picture: None,
        };
        let payload = NotificationPayload::follow(&actor);
        assert!(h.dispatcher.notify(&user("alice"), &payload).is_none());
        assert!(alice.try_recv().is_err());
    }

    #[test]
    fn direct_message_goes_to_both_sides() {
        let h = harness();
        let mut alice = h.online("alice");
        let mut bob = h.online("bob");
        let message = DirectMessage {
            id: MessageId::from_raw("msg_1"),
            content: "hey".into(),
            message_type: "text".into(),
            sender: UserSummary {
                id: user("bob"),
                username: "bob".into(),
                profile_picture: None,
            },
            is_own: false,
            is_read: false,
            created_at: "2024-01-01T00:00:00.000000".into(),
        };

        let report = h.dispatcher.send_direct_message("conv-1", &user("alice"), &message);
        assert_eq!(report.delivered, 2);

        let to_alice = next_json(&mut alice);
        assert_eq!(to_alice["type"], "new_message");
        assert_eq!(to_alice["conversation_id"], "conv-1");
        assert_eq!(to_alice["message"]["is_own"], false);
        let to_bob = next_json(&mut bob);
        assert_eq!(to_bob["message"]["is_own"], true);
        assert_eq!(to_bob["message"]["sender"]["username"], "bob");
    }
}
