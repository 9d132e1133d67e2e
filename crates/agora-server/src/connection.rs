use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use agora_core::{ConnectionId, UserId};

pub use agora_telemetry::DropKind as DropReason;

/// One encoded text frame. Clones share the buffer, so a fan-out encodes once
/// and every recipient queues the same bytes.
pub type Frame = Utf8Bytes;

/// Outcome of one delivery attempt. Callers may ignore it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Dropped(DropReason),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// One live socket. Frames are queued here and written by the session's
/// writer task, so sends from any task keep their call order.
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub connected_at: DateTime<Utc>,
    tx: mpsc::Sender<Frame>,
}

impl Connection {
    /// Create a connection and the receiving end its writer drains.
    pub fn open(user_id: UserId, max_send_queue: usize) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(max_send_queue.max(1));
        let conn = Arc::new(Self {
            id: ConnectionId::new(),
            user_id,
            connected_at: Utc::now(),
            tx,
        });
        (conn, rx)
    }

    /// Enqueue a serialized frame without waiting.
    pub fn send(&self, frame: Frame) -> Delivery {
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                tracing::warn!(
                    conn_id = %self.id,
                    user_id = %self.user_id,
                    frame_len = frame.len(),
                    "send queue full, dropping frame"
                );
                Delivery::Dropped(DropReason::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Dropped(DropReason::Closed),
        }
    }

    /// True once the writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_enqueues_in_order() {
        let (conn, mut rx) = Connection::open(UserId::from_raw("alice"), 8);
        assert!(conn.send(Frame::from("one")).is_delivered());
        assert!(conn.send(Frame::from("two")).is_delivered());
        assert_eq!(&*rx.recv().await.unwrap(), "one");
        assert_eq!(&*rx.recv().await.unwrap(), "two");
    }

    #[test]
    fn full_queue_drops() {
        let (conn, _rx) = Connection::open(UserId::from_raw("alice"), 2);
        assert_eq!(conn.send(Frame::from("a")), Delivery::Delivered);
        assert_eq!(conn.send(Frame::from("b")), Delivery::Delivered);
        assert_eq!(conn.send(Frame::from("c")), Delivery::Dropped(DropReason::QueueFull));
    }

    #[test]
    fn closed_receiver_drops() {
        let (conn, rx) = Connection::open(UserId::from_raw("alice"), 2);
        drop(rx);
        assert!(conn.is_closed());
        assert_eq!(conn.send(Frame::from("a")), Delivery::Dropped(DropReason::Closed));
    }

    #[test]
    fn zero_queue_is_clamped() {
        let (conn, _rx) = Connection::open(UserId::from_raw("alice"), 0);
        assert!(conn.send(Frame::from("a")).is_delivered());
    }

    #[test]
    fn ids_are_unique_per_open() {
        let (a, _ra) = Connection::open(UserId::from_raw("alice"), 1);
        let (b, _rb) = Connection::open(UserId::from_raw("alice"), 1);
        assert_ne!(a.id, b.id);
        assert!(a.id.as_str().starts_with("conn_"));
    }
}
