//! EventSub WebSocket client for real-time Twitch chat.
//!
//! [`transport`] keeps one socket alive against wss://eventsub.wss.twitch.tv/ws
//! (welcome handshake, keepalive deadline, `session_reconnect` hand-off).
//! [`supervisor`] owns retry/backoff and the `channel.chat.message`
//! subscription on top of it.

pub mod frame;
pub mod socket;
pub mod supervisor;
pub mod transport;

use std::time::Duration;

pub use frame::{ChatMessageEvent, EventSubFrame, Notification, SessionInfo};
pub use socket::{Connector, Socket, TungsteniteConnector, WsFrame};
pub use supervisor::{
    ConnectionState, ConnectionStatus, RetryPolicy, Supervisor, SupervisorConfig,
    SupervisorHandle,
};
pub use transport::{EventSubTransport, TransportEvent, TransportHandle, TransportStatus};

pub const EVENTSUB_URL: &str = "wss://eventsub.wss.twitch.tv/ws";

/// Time allowed between opening a socket and receiving `session_welcome`.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);
/// Keepalive interval assumed when the welcome does not advertise one.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(5);
/// Slack added on top of the advertised keepalive interval.
pub const KEEPALIVE_BUFFER: Duration = Duration::from_secs(10);
/// Delay before reopening a known reconnect URL after an abnormal close.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);
/// Twitch closes sessions with no subscription after this long.
pub const SUBSCRIPTION_WINDOW: Duration = Duration::from_secs(10);

pub const CLOSE_NORMAL: u16 = 1000;
/// Close code Twitch sends when no subscription was created in time.
pub const CLOSE_UNUSED_CONNECTION: u16 = 4003;

pub const EVENT_CHAT_MESSAGE: &str = "channel.chat.message";

/// Failures surfaced by the transport. Cloneable so the same reason can be
/// published on the status channel and returned to waiters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("session welcome not received within {}s", HANDSHAKE_TIMEOUT.as_secs())]
    HandshakeTimeout,

    #[error("connection closed by Twitch: no subscription created in time (4003)")]
    UnusedConnection,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection closed")]
    Closed,
}
