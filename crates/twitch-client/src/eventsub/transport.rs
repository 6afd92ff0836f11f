//! One EventSub connection, kept alive across keepalive lapses and
//! `session_reconnect` hand-offs.
//!
//! The connection runs as a task. It publishes its state on a `watch`
//! channel and delivers [`TransportEvent`]s on an `mpsc` channel. Retrying
//! after a failure is the supervisor's job, not the transport's.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::frame::{self, EventSubFrame, Notification, SessionInfo};
use super::socket::{Connector, Socket, WsFrame};
use super::{
    CLOSE_NORMAL, CLOSE_UNUSED_CONNECTION, DEFAULT_KEEPALIVE, HANDSHAKE_TIMEOUT,
    KEEPALIVE_BUFFER, RECONNECT_DELAY, TransportError,
};

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A welcome arrived. `resumed` is true on a reconnect URL, where the
    /// existing subscriptions carry over.
    SessionEstablished { session_id: String, resumed: bool },
    ConnectionChanged { connected: bool },
    Notification(Notification),
    Revoked { subscription_type: String, status: String },
    Error(TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    Idle,
    Connecting,
    SessionPending,
    Live { session_id: String },
    Reconnecting,
    Failed(TransportError),
}

pub struct EventSubTransport;

impl EventSubTransport {
    /// Open a connection and wait for its welcome, or fail after the
    /// handshake timeout.
    pub async fn connect<C: Connector>(
        connector: Arc<C>,
        url: &str,
    ) -> Result<(TransportHandle, mpsc::Receiver<TransportEvent>), TransportError> {
        let (mut handle, events) = Self::spawn(connector, url);
        match handle.wait_for_session_welcome().await {
            Ok(_) => Ok((handle, events)),
            Err(e) => {
                handle.disconnect().await;
                Err(e)
            }
        }
    }

    /// Start a connection task without waiting for the handshake.
    pub fn spawn<C: Connector>(
        connector: Arc<C>,
        url: &str,
    ) -> (TransportHandle, mpsc::Receiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let status = Arc::new(watch::Sender::new(TransportStatus::Connecting));

        let task = ConnectionTask {
            connector,
            base_url: url.to_string(),
            reconnect_url: None,
            status: Arc::clone(&status),
            events: event_tx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(task.run());

        let handle = TransportHandle {
            status,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        };
        (handle, event_rx)
    }
}

/// Owner's side of a connection task. Dropping it shuts the task down.
pub struct TransportHandle {
    status: Arc<watch::Sender<TransportStatus>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TransportHandle {
    pub fn status(&self) -> TransportStatus {
        self.status.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.status.borrow(), TransportStatus::Live { .. })
    }

    pub fn session_id(&self) -> Option<String> {
        match &*self.status.borrow() {
            TransportStatus::Live { session_id } => Some(session_id.clone()),
            _ => None,
        }
    }

    /// Resolve with the session id once live. After a failed handshake this
    /// returns the failure instead of waiting.
    pub async fn wait_for_session_welcome(&self) -> Result<String, TransportError> {
        let mut rx = self.status.subscribe();
        let status = rx
            .wait_for(|s| {
                matches!(
                    s,
                    TransportStatus::Live { .. } | TransportStatus::Failed(_) | TransportStatus::Idle
                )
            })
            .await
            .map_err(|_| TransportError::Closed)?
            .clone();
        match status {
            TransportStatus::Live { session_id } => Ok(session_id),
            TransportStatus::Failed(reason) => Err(reason),
            _ => Err(TransportError::Closed),
        }
    }

    /// Close with the normal code and stop the task. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "EventSub transport task ended abnormally");
            }
        }
        self.status.send_replace(TransportStatus::Idle);
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Why a live connection ended.
enum Exit {
    Shutdown,
    Reopen {
        url: String,
        resumed: bool,
        delay: Option<Duration>,
    },
    Closed,
    Failed(TransportError),
}

struct ConnectionTask<C: Connector> {
    connector: Arc<C>,
    base_url: String,
    /// Pending `session_reconnect` target. Cleared by the welcome it leads
    /// to, so a later session never resumes on a spent URL.
    reconnect_url: Option<String>,
    status: Arc<watch::Sender<TransportStatus>>,
    events: mpsc::Sender<TransportEvent>,
    shutdown: oneshot::Receiver<()>,
}

impl<C: Connector> ConnectionTask<C> {
    async fn run(mut self) {
        let mut url = self.base_url.clone();
        let mut resumed = false;
        let mut reopening = false;

        loop {
            let exit = self.run_connection(&url, resumed, reopening).await;
            match exit {
                Exit::Shutdown => {
                    self.reconnect_url = None;
                    self.status.send_replace(TransportStatus::Idle);
                    return;
                }
                Exit::Reopen {
                    url: next,
                    resumed: next_resumed,
                    delay,
                } => {
                    self.status.send_replace(TransportStatus::Reconnecting);
                    if let Some(delay) = delay {
                        tokio::select! {
                            _ = &mut self.shutdown => {
                                self.status.send_replace(TransportStatus::Idle);
                                return;
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    url = next;
                    resumed = next_resumed;
                    reopening = true;
                }
                Exit::Closed => {
                    self.emit(TransportEvent::ConnectionChanged { connected: false })
                        .await;
                    self.status.send_replace(TransportStatus::Idle);
                    return;
                }
                Exit::Failed(e) => {
                    tracing::warn!(error = %e, "EventSub transport failed");
                    self.status.send_replace(TransportStatus::Failed(e.clone()));
                    self.emit(TransportEvent::Error(e)).await;
                    return;
                }
            }
        }
    }

    async fn run_connection(&mut self, url: &str, resumed: bool, reopening: bool) -> Exit {
        if !reopening {
            self.status.send_replace(TransportStatus::Connecting);
        }

        let handshake = tokio::time::timeout(
            HANDSHAKE_TIMEOUT,
            open_session(&*self.connector, &self.status, url),
        );
        let (mut socket, session) = tokio::select! {
            _ = &mut self.shutdown => return Exit::Shutdown,
            result = handshake => match result {
                Ok(Ok(opened)) => opened,
                Ok(Err(e)) => return self.on_handshake_error(e),
                Err(_) => return Exit::Failed(TransportError::HandshakeTimeout),
            },
        };
        self.reconnect_url = None;

        let session_id = session.id.clone();
        let mut deadline = keepalive_deadline(&session);
        tracing::info!(
            session_id = %session_id,
            resumed,
            keepalive_secs = deadline.as_secs(),
            "EventSub session established"
        );
        self.status.send_replace(TransportStatus::Live {
            session_id: session_id.clone(),
        });
        self.emit(TransportEvent::SessionEstablished {
            session_id,
            resumed,
        })
        .await;
        self.emit(TransportEvent::ConnectionChanged { connected: true })
            .await;

        let liveness = tokio::time::sleep(deadline);
        tokio::pin!(liveness);

        loop {
            tokio::select! {
                _ = &mut self.shutdown => {
                    socket.close(CLOSE_NORMAL).await;
                    return Exit::Shutdown;
                }
                () = &mut liveness => {
                    tracing::warn!(
                        timeout_secs = deadline.as_secs(),
                        "EventSub keepalive timeout, reopening connection"
                    );
                    socket.close(CLOSE_NORMAL).await;
                    return Exit::Reopen {
                        url: self.base_url.clone(),
                        resumed: false,
                        delay: None,
                    };
                }
                frame = socket.next_frame() => {
                    // Any inbound traffic counts as liveness.
                    liveness.as_mut().reset(Instant::now() + deadline);
                    match frame {
                        Some(Ok(WsFrame::Text(text))) => {
                            if let Some(exit) = self.handle_text(&text, &mut deadline).await {
                                socket.close(CLOSE_NORMAL).await;
                                return exit;
                            }
                        }
                        Some(Ok(WsFrame::Ping(data))) => {
                            if let Err(e) = socket.send_pong(data).await {
                                tracing::debug!(error = %e, "EventSub pong failed");
                            }
                        }
                        Some(Ok(WsFrame::Close(code))) => return self.on_close(code),
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "EventSub socket error");
                            return self.on_close(None);
                        }
                        None => return self.on_close(None),
                    }
                }
            }
        }
    }

    /// Handle one text frame. Returns an exit when the frame ends the connection.
    async fn handle_text(&mut self, text: &str, deadline: &mut Duration) -> Option<Exit> {
        let frame = match frame::parse_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed EventSub frame");
                return None;
            }
        };

        match frame {
            EventSubFrame::Keepalive => {
                tracing::trace!("EventSub keepalive received");
            }
            EventSubFrame::Welcome(session) => {
                *deadline = keepalive_deadline(&session);
                tracing::debug!(session_id = %session.id, "Repeated EventSub welcome");
            }
            EventSubFrame::Notification(notification) => {
                tracing::debug!(
                    subscription_type = %notification.subscription_type,
                    message_id = %notification.message_id,
                    "EventSub notification"
                );
                self.emit(TransportEvent::Notification(notification)).await;
            }
            EventSubFrame::Reconnect { url } => {
                tracing::info!(next_url = %url, "EventSub session_reconnect received");
                self.reconnect_url = Some(url.clone());
                return Some(Exit::Reopen {
                    url,
                    resumed: true,
                    delay: None,
                });
            }
            EventSubFrame::Revocation {
                subscription_type,
                status,
            } => {
                tracing::warn!(%subscription_type, %status, "EventSub subscription revoked");
                self.emit(TransportEvent::Revoked {
                    subscription_type,
                    status,
                })
                .await;
            }
            EventSubFrame::Other(message_type) => {
                tracing::debug!(msg_type = %message_type, "Unhandled EventSub message");
            }
        }
        None
    }

    fn on_close(&self, code: Option<u16>) -> Exit {
        match code {
            Some(CLOSE_UNUSED_CONNECTION) => Exit::Failed(TransportError::UnusedConnection),
            Some(CLOSE_NORMAL) => {
                tracing::info!("EventSub connection closed by server");
                Exit::Closed
            }
            _ => {
                tracing::warn!(?code, "EventSub closed abnormally");
                Exit::Closed
            }
        }
    }

    /// A dropped handshake on a pending reconnect target is tried once more
    /// after a short delay. Anything else ends the connection.
    fn on_handshake_error(&mut self, error: TransportError) -> Exit {
        match (&error, self.reconnect_url.take()) {
            (TransportError::Closed | TransportError::Connect(_), Some(url)) => {
                tracing::warn!(
                    error = %error,
                    delay_secs = RECONNECT_DELAY.as_secs(),
                    "EventSub reconnect handshake dropped, retrying reconnect URL"
                );
                Exit::Reopen {
                    url,
                    resumed: true,
                    delay: Some(RECONNECT_DELAY),
                }
            }
            _ => Exit::Failed(error),
        }
    }

    async fn emit(&mut self, event: TransportEvent) {
        if self.events.send(event).await.is_err() {
            tracing::trace!("EventSub event receiver dropped");
        }
    }
}

/// Open the socket and read until `session_welcome`.
async fn open_session<C: Connector>(
    connector: &C,
    status: &watch::Sender<TransportStatus>,
    url: &str,
) -> Result<(C::Socket, SessionInfo), TransportError> {
    let mut socket = connector.connect(url).await?;
    status.send_replace(TransportStatus::SessionPending);

    loop {
        match socket.next_frame().await {
            Some(Ok(WsFrame::Text(text))) => match frame::parse_frame(&text)? {
                EventSubFrame::Welcome(session) => return Ok((socket, session)),
                other => tracing::debug!(?other, "EventSub frame before welcome ignored"),
            },
            Some(Ok(WsFrame::Ping(data))) => socket.send_pong(data).await?,
            Some(Ok(WsFrame::Close(Some(CLOSE_UNUSED_CONNECTION)))) => {
                return Err(TransportError::UnusedConnection);
            }
            Some(Ok(WsFrame::Close(_))) | None => return Err(TransportError::Closed),
            Some(Err(e)) => return Err(e),
        }
    }
}

fn keepalive_deadline(session: &SessionInfo) -> Duration {
    session
        .keepalive_timeout_seconds
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_KEEPALIVE)
        + KEEPALIVE_BUFFER
}
