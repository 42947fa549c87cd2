use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc, Mutex, MutexGuard, PoisonError,
};
use std::time::Duration;

use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc as async_mpsc, watch};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};

use crate::domain::events::{
    ChatReadPush, ChatUpdatedPush, ConnectionStatus, NewMessagePush, PresenceUpdate, TypingUpdate,
};
use crate::domain::identity::SessionCredentials;
use crate::infra::config::RealtimeConfig;
use crate::realtime::listeners::{ListenerHub, Subscription};
use crate::realtime::protocol::{ClientFrame, ServerFrame};

const REALTIME_CONNECTED: &str = "REALTIME_CONNECTED";
const REALTIME_DISCONNECTED: &str = "REALTIME_DISCONNECTED";
const REALTIME_HANDSHAKE_REFUSED: &str = "REALTIME_HANDSHAKE_REFUSED";
const REALTIME_FRAME_DECODE_FAILED: &str = "REALTIME_FRAME_DECODE_FAILED";
const REALTIME_EVENT_PAYLOAD_INVALID: &str = "REALTIME_EVENT_PAYLOAD_INVALID";
const REALTIME_JOIN_SKIPPED: &str = "REALTIME_JOIN_SKIPPED";
const REALTIME_EMIT_DROPPED: &str = "REALTIME_EMIT_DROPPED";
const REALTIME_READER_STOPPED: &str = "REALTIME_READER_STOPPED";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

/// Failure of a [`RealtimeChannel::connect`] attempt. The channel never
/// retries on its own; re-invoking `connect` is safe at any time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    #[error("no credential available for the broker handshake")]
    MissingCredential,
    #[error("broker refused the handshake: {0}")]
    HandshakeRefused(String),
    #[error("broker connection failed: {0}")]
    ConnectFailed(String),
}

/// One logical connection per authenticated session to the message broker.
///
/// Owns the socket lifecycle (handshake, reader/writer tasks, teardown) and
/// dispatches inbound push events to registered listeners. Room
/// subscriptions are not restored across reconnects; after a drop the
/// consumer re-issues [`RealtimeChannel::join_rooms_for_user`].
pub struct RealtimeChannel {
    config: RealtimeConfig,
    hub: Arc<ListenerHub>,
    status: Arc<StatusCell>,
    conn: Mutex<Option<ActiveConnection>>,
}

struct ActiveConnection {
    user_id: String,
    outbound: async_mpsc::UnboundedSender<ClientFrame>,
    stop_tx: watch::Sender<bool>,
    alive: Arc<AtomicBool>,
}

impl RealtimeChannel {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            config,
            hub: Arc::new(ListenerHub::default()),
            status: Arc::new(StatusCell::default()),
            conn: Mutex::new(None),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    pub fn is_connected(&self) -> bool {
        self.status.get() == ConnectionStatus::Connected
    }

    /// Subscribes to connection status changes; the current status is
    /// delivered immediately.
    pub fn subscribe_status(&self) -> mpsc::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Establishes the broker connection with the given bearer credential.
    ///
    /// Resolves once the handshake is accepted. Calling while already
    /// connected is a no-op that resolves immediately; calling after a
    /// mid-session drop discards the dead connection and dials again.
    pub async fn connect(&self, credentials: &SessionCredentials) -> Result<(), RealtimeError> {
        {
            let mut conn = self.conn_locked();
            if let Some(active) = conn.as_ref() {
                if active.alive.load(Ordering::SeqCst) {
                    return Ok(());
                }
                // The reader died; drop the stale handle before redialing.
                conn.take();
            }
        }

        if credentials.is_empty() {
            return Err(RealtimeError::MissingCredential);
        }

        self.status.set(ConnectionStatus::Connecting);
        match self.establish(credentials).await {
            Ok(()) => Ok(()),
            Err(error) => {
                self.status.set(ConnectionStatus::Disconnected);
                Err(error)
            }
        }
    }

    async fn establish(&self, credentials: &SessionCredentials) -> Result<(), RealtimeError> {
        let (ws, _) = connect_async(self.config.url.as_str())
            .await
            .map_err(|error| RealtimeError::ConnectFailed(error.to_string()))?;
        let (mut sink, mut source) = ws.split();

        let auth = ClientFrame::Authenticate {
            token: credentials.token().to_owned(),
        };
        let encoded = serde_json::to_string(&auth)
            .map_err(|error| RealtimeError::ConnectFailed(error.to_string()))?;
        sink.send(WsMessage::Text(encoded))
            .await
            .map_err(|error| RealtimeError::ConnectFailed(error.to_string()))?;

        let handshake = tokio::time::timeout(
            Duration::from_millis(self.config.handshake_timeout_ms),
            next_frame(&mut source),
        )
        .await;
        let user_id = match handshake {
            Err(_) => {
                return Err(RealtimeError::ConnectFailed(
                    "handshake timed out".to_owned(),
                ))
            }
            Ok(None) => {
                return Err(RealtimeError::ConnectFailed(
                    "connection closed during handshake".to_owned(),
                ))
            }
            Ok(Some(Err(error))) => return Err(RealtimeError::ConnectFailed(error)),
            Ok(Some(Ok(ServerFrame::Authenticated { user_id }))) => user_id,
            Ok(Some(Ok(ServerFrame::Unauthorized { reason }))) => {
                tracing::warn!(
                    code = REALTIME_HANDSHAKE_REFUSED,
                    reason = %reason,
                    "broker refused the handshake"
                );
                return Err(RealtimeError::HandshakeRefused(reason));
            }
            Ok(Some(Ok(other))) => {
                return Err(RealtimeError::ConnectFailed(format!(
                    "unexpected handshake frame: {other:?}"
                )))
            }
        };

        let (out_tx, out_rx) = async_mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let alive = Arc::new(AtomicBool::new(true));

        tokio::spawn(run_writer(sink, out_rx));
        tokio::spawn(run_reader(
            source,
            Arc::clone(&self.hub),
            Arc::clone(&self.status),
            Arc::clone(&alive),
            stop_rx,
        ));

        self.status.set(ConnectionStatus::Connected);
        tracing::info!(
            code = REALTIME_CONNECTED,
            user_id = %user_id,
            "broker connection established"
        );

        *self.conn_locked() = Some(ActiveConnection {
            user_id,
            outbound: out_tx,
            stop_tx,
            alive,
        });
        Ok(())
    }

    /// Tears down the connection and discards it; idempotent.
    pub fn disconnect(&self) {
        let discarded = self.conn_locked().take();
        if let Some(active) = discarded {
            let _ = active.stop_tx.send(true);
            tracing::info!(code = REALTIME_DISCONNECTED, "broker connection discarded");
        }
        self.status.set(ConnectionStatus::Disconnected);
    }

    /// Subscribes to push events for a set of chat rooms in one call.
    /// Requires an established connection (which implies a known user
    /// identity); otherwise warns and does nothing.
    pub fn join_rooms_for_user(&self, chat_ids: &[String]) {
        let conn = self.conn_locked();
        let Some(active) = conn.as_ref().filter(|a| a.alive.load(Ordering::SeqCst)) else {
            tracing::warn!(
                code = REALTIME_JOIN_SKIPPED,
                rooms = chat_ids.len(),
                "cannot join rooms without an established connection"
            );
            return;
        };

        let frame = ClientFrame::JoinUserRooms {
            user_id: active.user_id.clone(),
            chat_ids: chat_ids.to_vec(),
        };
        if active.outbound.send(frame).is_err() {
            tracing::warn!(code = REALTIME_JOIN_SKIPPED, "connection writer is gone");
        }
    }

    /// Subscribes to one chat room; safe to issue repeatedly.
    pub fn join_room(&self, chat_id: &str) {
        self.send_or_warn(ClientFrame::JoinRoom {
            chat_id: chat_id.to_owned(),
        });
    }

    /// Unsubscribes from one chat room; safe to issue repeatedly.
    pub fn leave_room(&self, chat_id: &str) {
        self.send_or_warn(ClientFrame::LeaveRoom {
            chat_id: chat_id.to_owned(),
        });
    }

    /// Fire-and-forget typing indicator; no acknowledgement is awaited and
    /// a disconnected channel drops the emit silently.
    pub fn send_typing(&self, chat_id: &str, is_typing: bool) {
        self.send_best_effort(|user_id| ClientFrame::Typing {
            chat_id: chat_id.to_owned(),
            user_id: user_id.to_owned(),
            is_typing,
        });
    }

    /// Fire-and-forget presence update for the authenticated user.
    pub fn update_presence(&self, status: &str) {
        self.send_best_effort(|user_id| ClientFrame::UpdateStatus {
            user_id: user_id.to_owned(),
            status: status.to_owned(),
        });
    }

    pub fn on_message<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&NewMessagePush) + Send + Sync + 'static,
    {
        self.hub.subscribe(|hub| &hub.message, handler)
    }

    pub fn on_chat_updated<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ChatUpdatedPush) + Send + Sync + 'static,
    {
        self.hub.subscribe(|hub| &hub.chat_updated, handler)
    }

    pub fn on_chat_read<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ChatReadPush) + Send + Sync + 'static,
    {
        self.hub.subscribe(|hub| &hub.chat_read, handler)
    }

    pub fn on_typing<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TypingUpdate) + Send + Sync + 'static,
    {
        self.hub.subscribe(|hub| &hub.typing, handler)
    }

    pub fn on_presence_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PresenceUpdate) + Send + Sync + 'static,
    {
        self.hub.subscribe(|hub| &hub.presence, handler)
    }

    fn conn_locked(&self) -> MutexGuard<'_, Option<ActiveConnection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send_or_warn(&self, frame: ClientFrame) {
        let conn = self.conn_locked();
        match conn.as_ref().filter(|a| a.alive.load(Ordering::SeqCst)) {
            Some(active) => {
                if active.outbound.send(frame).is_err() {
                    tracing::warn!(code = REALTIME_EMIT_DROPPED, "connection writer is gone");
                }
            }
            None => {
                tracing::warn!(
                    code = REALTIME_EMIT_DROPPED,
                    "room subscription change dropped: not connected"
                );
            }
        }
    }

    fn send_best_effort(&self, build: impl FnOnce(&str) -> ClientFrame) {
        let conn = self.conn_locked();
        if let Some(active) = conn.as_ref().filter(|a| a.alive.load(Ordering::SeqCst)) {
            let _ = active.outbound.send(build(&active.user_id));
        } else {
            tracing::debug!("ephemeral emit dropped: not connected");
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Some(active) = self.conn_locked().take() {
            let _ = active.stop_tx.send(true);
        }
    }
}

async fn next_frame(source: &mut WsSource) -> Option<Result<ServerFrame, String>> {
    loop {
        match source.next().await? {
            Ok(WsMessage::Text(text)) => {
                return Some(serde_json::from_str(&text).map_err(|error| error.to_string()))
            }
            Ok(WsMessage::Close(_)) => return None,
            Ok(_) => continue,
            Err(error) => return Some(Err(error.to_string())),
        }
    }
}

async fn run_writer(mut sink: WsSink, mut out_rx: async_mpsc::UnboundedReceiver<ClientFrame>) {
    while let Some(frame) = out_rx.recv().await {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(code = REALTIME_EMIT_DROPPED, error = %error, "frame failed to encode");
                continue;
            }
        };
        if let Err(error) = sink.send(WsMessage::Text(text)).await {
            tracing::debug!(
                code = REALTIME_EMIT_DROPPED,
                error = %error,
                "outbound frame dropped; stopping writer"
            );
            break;
        }
    }
    let _ = sink.close().await;
}

async fn run_reader(
    mut source: WsSource,
    hub: Arc<ListenerHub>,
    status: Arc<StatusCell>,
    alive: Arc<AtomicBool>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    tracing::debug!(code = REALTIME_READER_STOPPED, "reader stopped by teardown signal");
                    break;
                }
            }
            incoming = source.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<ServerFrame>(&text) {
                        Ok(frame) => dispatch_frame(frame, &hub),
                        Err(error) => tracing::warn!(
                            code = REALTIME_FRAME_DECODE_FAILED,
                            error = %error,
                            "dropping undecodable broker frame"
                        ),
                    },
                    Some(Ok(WsMessage::Close(_))) | None => {
                        tracing::info!(code = REALTIME_DISCONNECTED, "broker closed the connection");
                        break;
                    }
                    // Control frames are handled by the websocket layer.
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::warn!(
                            code = REALTIME_DISCONNECTED,
                            error = %error,
                            "broker connection dropped"
                        );
                        break;
                    }
                }
            }
        }
    }
    alive.store(false, Ordering::SeqCst);
    status.set(ConnectionStatus::Disconnected);
}

fn dispatch_frame(frame: ServerFrame, hub: &ListenerHub) {
    match frame {
        ServerFrame::NewMessage { message, chat_id } => {
            hub.message.dispatch(&NewMessagePush {
                chat_id,
                message: message.into_domain(),
            });
        }
        ServerFrame::ChatUpdated { chat } => match chat.into_domain() {
            Ok(chat) => hub.chat_updated.dispatch(&ChatUpdatedPush { chat }),
            Err(reason) => tracing::warn!(
                code = REALTIME_EVENT_PAYLOAD_INVALID,
                reason = %reason,
                "dropping chatUpdated event"
            ),
        },
        ServerFrame::ChatRead { chat_id, user_id } => {
            hub.chat_read.dispatch(&ChatReadPush { chat_id, user_id });
        }
        ServerFrame::UserTyping {
            chat_id,
            user_id,
            is_typing,
        } => {
            hub.typing.dispatch(&TypingUpdate {
                chat_id,
                user_id,
                is_typing,
            });
        }
        ServerFrame::UserStatusChanged { user_id, status } => {
            hub.presence.dispatch(&PresenceUpdate { user_id, status });
        }
        ServerFrame::Authenticated { .. } | ServerFrame::Unauthorized { .. } => {
            tracing::debug!("ignoring handshake frame outside the handshake");
        }
    }
}

#[derive(Default)]
struct StatusCell {
    inner: Mutex<StatusCellState>,
}

#[derive(Default)]
struct StatusCellState {
    status: ConnectionStatus,
    subscribers: Vec<mpsc::Sender<ConnectionStatus>>,
}

impl StatusCell {
    fn locked(&self) -> MutexGuard<'_, StatusCellState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self) -> ConnectionStatus {
        self.locked().status
    }

    fn set(&self, status: ConnectionStatus) {
        let mut state = self.locked();
        if state.status == status {
            return;
        }
        state.status = status;
        state.subscribers.retain(|sub| sub.send(status).is_ok());
    }

    fn subscribe(&self) -> mpsc::Receiver<ConnectionStatus> {
        let (tx, rx) = mpsc::channel();
        let mut state = self.locked();
        let _ = tx.send(state.status);
        state.subscribers.push(tx);
        rx
    }
}
