//! Twitch Helix REST API client.
//!
//! Only the EventSub subscription endpoints are used. Every call presents
//! the caller's [`Credentials`] as Bearer token + Client-Id headers.

mod request;
mod subscriptions;

pub mod models;

pub use models::{
    CreateSubscriptionRequest, EventSubSubscription, HelixResponse, SubscriptionTransport,
};
pub use subscriptions::SubscriptionApi;

use crate::{Credentials, TwitchError};

const HELIX_BASE: &str = "https://api.twitch.tv/helix";

/// Twitch Helix API client with auth header injection.
#[derive(Debug, Clone)]
pub struct TwitchApiClient {
    pub(super) http: reqwest::Client,
    pub(super) base_url: String,
}
