//! Twitch integration client library.
//!
//! Provides the EventSub WebSocket transport, the connection supervisor that
//! keeps a chat subscription alive, and the Helix EventSub subscription API.

pub mod api;
pub mod eventsub;

use serde::{Deserialize, Serialize};

pub use eventsub::TransportError;

/// Credentials used for Helix calls and EventSub subscriptions.
///
/// The access token is obtained elsewhere; this crate only presents it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub access_token: String,
    /// Id of the authenticated user; used as the chat subscription requester.
    pub user_id: String,
}

impl Credentials {
    /// Fail with the first missing field.
    pub fn validate(&self) -> Result<(), TwitchError> {
        if self.client_id.trim().is_empty() {
            return Err(TwitchError::MissingCredential("client_id"));
        }
        if self.access_token.trim().is_empty() {
            return Err(TwitchError::MissingCredential("access_token"));
        }
        if self.user_id.trim().is_empty() {
            return Err(TwitchError::MissingCredential("user_id"));
        }
        Ok(())
    }
}

/// Unified error type for the twitch-client crate.
#[derive(Debug, thiserror::Error)]
pub enum TwitchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required credential: {0}")]
    MissingCredential(&'static str),

    #[error("Twitch API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("EventSub transport error: {0}")]
    Transport(#[from] TransportError),
}

impl TwitchError {
    /// Whether retrying can help. Missing credentials never resolve on their own.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, TwitchError::MissingCredential(_))
    }
}
