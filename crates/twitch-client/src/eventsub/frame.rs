//! EventSub frame decoding.

use serde::{Deserialize, Serialize};

use super::{EVENT_CHAT_MESSAGE, TransportError};

#[derive(Debug, Deserialize)]
struct RawFrame {
    metadata: FrameMetadata,
    #[serde(default)]
    payload: FramePayload,
}

#[derive(Debug, Deserialize)]
struct FrameMetadata {
    message_id: String,
    message_type: String,
    #[serde(default)]
    #[allow(dead_code)]
    message_timestamp: Option<String>,
    #[serde(default)]
    subscription_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FramePayload {
    #[serde(default)]
    session: Option<SessionInfo>,
    #[serde(default)]
    subscription: Option<SubscriptionInfo>,
    #[serde(default)]
    event: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub keepalive_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub reconnect_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SubscriptionInfo {
    #[serde(rename = "type")]
    subscription_type: String,
    #[serde(default)]
    status: String,
}

/// A notification frame, with the event body left undecoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message_id: String,
    pub subscription_type: String,
    pub event: serde_json::Value,
}

impl Notification {
    /// Decode the body of a `channel.chat.message` notification.
    /// Returns `None` for any other subscription type.
    pub fn chat_message(&self) -> Option<Result<ChatMessageEvent, serde_json::Error>> {
        (self.subscription_type == EVENT_CHAT_MESSAGE)
            .then(|| serde_json::from_value(self.event.clone()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventSubFrame {
    Welcome(SessionInfo),
    Keepalive,
    Notification(Notification),
    Reconnect { url: String },
    Revocation { subscription_type: String, status: String },
    /// A message type this client does not handle.
    Other(String),
}

/// Decode one text frame.
pub fn parse_frame(text: &str) -> Result<EventSubFrame, TransportError> {
    let raw: RawFrame =
        serde_json::from_str(text).map_err(|e| TransportError::Protocol(e.to_string()))?;

    match raw.metadata.message_type.as_str() {
        "session_welcome" => raw
            .payload
            .session
            .map(EventSubFrame::Welcome)
            .ok_or_else(|| TransportError::Protocol("session_welcome missing session".into())),
        "session_keepalive" => Ok(EventSubFrame::Keepalive),
        "notification" => {
            let subscription_type = raw
                .metadata
                .subscription_type
                .or_else(|| raw.payload.subscription.map(|s| s.subscription_type))
                .unwrap_or_default();
            Ok(EventSubFrame::Notification(Notification {
                message_id: raw.metadata.message_id,
                subscription_type,
                event: raw.payload.event.unwrap_or(serde_json::Value::Null),
            }))
        }
        "session_reconnect" => parse_reconnect_url(raw.payload.session.as_ref())
            .map(|url| EventSubFrame::Reconnect { url })
            .ok_or_else(|| {
                TransportError::Protocol("session_reconnect missing reconnect_url".into())
            }),
        "revocation" => {
            let (subscription_type, status) = raw
                .payload
                .subscription
                .map(|s| (s.subscription_type, s.status))
                .unwrap_or_else(|| ("unknown".into(), "unknown".into()));
            Ok(EventSubFrame::Revocation {
                subscription_type,
                status,
            })
        }
        other => Ok(EventSubFrame::Other(other.to_string())),
    }
}

/// Extract a usable `ws://` or `wss://` reconnect URL.
pub fn parse_reconnect_url(session: Option<&SessionInfo>) -> Option<String> {
    session
        .and_then(|s| s.reconnect_url.as_deref())
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .and_then(|url| url::Url::parse(url).ok())
        .filter(|url| matches!(url.scheme(), "ws" | "wss"))
        .map(String::from)
}

/// Body of a `channel.chat.message` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageEvent {
    pub broadcaster_user_id: String,
    #[serde(default)]
    pub broadcaster_user_login: String,
    #[serde(default)]
    pub broadcaster_user_name: String,
    pub chatter_user_id: String,
    pub chatter_user_login: String,
    #[serde(default)]
    pub chatter_user_name: String,
    pub message_id: String,
    pub message: ChatMessageBody,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub badges: Vec<ChatBadge>,
    #[serde(default)]
    pub message_type: String,
    #[serde(default)]
    pub cheer: Option<ChatCheer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageBody {
    pub text: String,
    #[serde(default)]
    pub fragments: Vec<ChatFragment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatFragment {
    #[serde(rename = "type")]
    pub fragment_type: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatBadge {
    pub set_id: String,
    pub id: String,
    #[serde(default)]
    pub info: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCheer {
    pub bits: u32,
}
