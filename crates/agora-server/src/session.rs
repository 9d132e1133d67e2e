//! One socket from handshake to teardown.
//!
//! `Connecting -> Authenticated -> Active -> Closed`, or `Connecting -> Closed`
//! when the token is rejected. Inbound frames are handled in arrival order;
//! outbound frames go through the connection queue and a single writer task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, field, info, instrument, warn, Span};

use agora_core::{Command, ConnectionId, Envelope, UserId};

use crate::connection::{Connection, Delivery, DropReason, Frame};
use crate::hub::Hub;
use crate::registry::encode;

/// Close code sent when the handshake credential is rejected.
pub const AUTH_FAILED_CLOSE_CODE: u16 = 4001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticated,
    Active,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Authenticated)
                | (Connecting, Closed)
                | (Authenticated, Active)
                | (Authenticated, Closed)
                | (Active, Closed)
        )
    }

    /// Move to `next`. An illegal move is logged and ignored.
    pub fn advance(&mut self, next: SessionState) {
        if self.can_transition_to(next) {
            debug!(from = ?*self, to = ?next, "session state");
            *self = next;
        } else {
            warn!(from = ?*self, to = ?next, "illegal session transition ignored");
        }
    }
}

/// Teardown for one active session. Runs at most once: `run` consumes the
/// value, and if the session task is cancelled first, `Drop` schedules it.
pub struct SessionCleanup {
    hub: Arc<Hub>,
    user: UserId,
    conn_id: ConnectionId,
    done: Arc<AtomicBool>,
}

impl SessionCleanup {
    fn new(hub: Arc<Hub>, user: UserId, conn_id: ConnectionId) -> Self {
        Self {
            hub,
            user,
            conn_id,
            done: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn run(self) {
        finish(&self.hub, &self.user, &self.conn_id, &self.done).await;
    }
}

impl Drop for SessionCleanup {
    fn drop(&mut self) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(user_id = %self.user, conn_id = %self.conn_id, "no runtime for session cleanup");
            return;
        };
        let hub = Arc::clone(&self.hub);
        let user = self.user.clone();
        let conn_id = self.conn_id.clone();
        let done = Arc::clone(&self.done);
        let _ = handle.spawn(async move {
            finish(&hub, &user, &conn_id, &done).await;
        });
    }
}

async fn finish(hub: &Hub, user: &UserId, conn_id: &ConnectionId, done: &AtomicBool) {
    if done.swap(true, Ordering::AcqRel) {
        return;
    }
    let went_offline = hub.disconnect(user, conn_id).await;
    hub.stats().record_session_closed();
    info!(user_id = %user, conn_id = %conn_id, went_offline, "session closed");
}

/// Drive one socket. `token` is the raw `?token=` query value.
#[instrument(skip_all, fields(user_id = field::Empty, conn_id = field::Empty))]
pub async fn run_session(mut socket: WebSocket, hub: Arc<Hub>, token: Option<String>) {
    let mut state = SessionState::Connecting;

    let user = match hub.authenticate(token.as_deref().unwrap_or_default()).await {
        Ok(user) => user,
        Err(e) => {
            warn!(kind = e.error_kind(), error = %e, "socket authentication failed");
            hub.stats().record_auth_failure();
            let close = CloseFrame {
                code: AUTH_FAILED_CLOSE_CODE,
                reason: e.close_reason().into(),
            };
            let _ = socket.send(Message::Close(Some(close))).await;
            state.advance(SessionState::Closed);
            return;
        }
    };
    state.advance(SessionState::Authenticated);

    let (conn, rx) = hub.open_connection(user.clone());
    let span = Span::current();
    let _ = span.record("user_id", field::display(&user));
    let _ = span.record("conn_id", field::display(&conn.id));

    // Queued before registration so it is always the first frame out.
    let mut online = hub.list_online();
    if !online.contains(&user) {
        online.push(user.clone());
        online.sort();
    }
    let _ = reply(
        &hub,
        &conn,
        &Envelope::InitialData {
            online_users: online,
            user_id: user.clone(),
        },
    );

    let cleanup = register(&hub, &conn).await;
    state.advance(SessionState::Active);
    info!("session active");

    let (ws_tx, mut ws_rx) = socket.split();
    let mut writer = tokio::spawn(write_frames(ws_tx, rx));

    loop {
        tokio::select! {
            next = ws_rx.next() => match next {
                Some(Ok(msg)) => match inbound_text(msg) {
                    Inbound::Text(text) => handle_frame(&hub, &conn, &user, &text).await,
                    Inbound::Close => {
                        debug!("client sent close frame");
                        break;
                    }
                    Inbound::Skip => {}
                },
                Some(Err(e)) => {
                    debug!(error = %e, "socket read failed");
                    break;
                }
                None => break,
            },
            _ = &mut writer => {
                debug!("writer stopped");
                break;
            }
        }
    }

    state.advance(SessionState::Closed);
    cleanup.run().await;
    writer.abort();
}

/// Register `conn` with the hub and hand back its teardown guard. The guard
/// exists before the online broadcast is awaited, so a session cancelled
/// mid-announce still leaves the registry.
async fn register(hub: &Arc<Hub>, conn: &Arc<Connection>) -> SessionCleanup {
    let cleanup = SessionCleanup::new(Arc::clone(hub), conn.user_id.clone(), conn.id.clone());
    hub.stats().record_session_opened();
    if let Some(previous) = hub.connect(Arc::clone(conn)).await {
        info!(superseded = %previous.id, "replaced an existing connection for this user");
    }
    cleanup
}

enum Inbound {
    Text(String),
    Close,
    Skip,
}

fn inbound_text(msg: Message) -> Inbound {
    match msg {
        Message::Text(text) => Inbound::Text(text.to_string()),
        Message::Binary(data) => match std::str::from_utf8(&data) {
            Ok(s) => Inbound::Text(s.to_owned()),
            Err(_) => {
                debug!(len = data.len(), "ignoring non-UTF-8 binary frame");
                Inbound::Skip
            }
        },
        Message::Close(_) => Inbound::Close,
        // Transport keepalives are answered by the socket layer.
        Message::Ping(_) | Message::Pong(_) => Inbound::Skip,
    }
}

async fn handle_frame(hub: &Hub, conn: &Connection, user: &UserId, text: &str) {
    let command = match Command::decode(text) {
        Ok(command) => command,
        Err(e) => {
            debug!(error = %e, "ignoring frame");
            hub.stats().record_frame_ignored();
            return;
        }
    };
    debug!(kind = command.kind(), "frame");

    match command {
        Command::Ping => {
            let _ = reply(hub, conn, &Envelope::Pong);
        }
        Command::ChatMessage { room_id, message } => {
            let _ = hub.post_chat_message(&room_id, user, &message).await;
        }
        Command::JoinRoom { room_id } => {
            let _ = hub.join_room(&room_id, user);
        }
        Command::LeaveRoom { room_id } => {
            let _ = hub.leave_room(&room_id, user);
        }
        Command::Typing { room_id } => {
            let _ = hub.send_typing(&room_id, user);
        }
    }
}

/// Send straight to this session's own connection, bypassing the registry,
/// so replies reach this socket even after it has been superseded.
fn reply(hub: &Hub, conn: &Connection, envelope: &Envelope) -> Delivery {
    let delivery = match encode(envelope) {
        Some(frame) => conn.send(frame),
        None => Delivery::Dropped(DropReason::Encode),
    };
    match delivery {
        Delivery::Delivered => hub.stats().record_delivered(),
        Delivery::Dropped(reason) => hub.stats().record_dropped(reason),
    }
    delivery
}

async fn write_frames(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Frame>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = sink.send(Message::Text(frame)).await {
            debug!(error = %e, "socket write failed");
            break;
        }
    }
}
