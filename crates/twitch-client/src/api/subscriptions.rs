use std::future::Future;

use super::*;
use crate::eventsub::EVENT_CHAT_MESSAGE;

/// EventSub subscription management, as used by the connection supervisor.
pub trait SubscriptionApi: Send + Sync + 'static {
    /// Subscribe `session_id` to chat messages in `channel_id`, reading as
    /// `credentials.user_id`.
    fn create_chat_subscription(
        &self,
        credentials: &Credentials,
        session_id: &str,
        channel_id: &str,
    ) -> impl Future<Output = Result<EventSubSubscription, TwitchError>> + Send;

    fn list_subscriptions(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Vec<EventSubSubscription>, TwitchError>> + Send;

    fn delete_subscription(
        &self,
        credentials: &Credentials,
        subscription_id: &str,
    ) -> impl Future<Output = Result<(), TwitchError>> + Send;
}

impl TwitchApiClient {
    fn chat_subscription_request(
        session_id: &str,
        channel_id: &str,
        user_id: &str,
    ) -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            subscription_type: EVENT_CHAT_MESSAGE.into(),
            version: "1".into(),
            condition: serde_json::json!({
                "broadcaster_user_id": channel_id,
                "user_id": user_id,
            }),
            transport: SubscriptionTransport {
                method: "websocket".into(),
                session_id: Some(session_id.into()),
            },
        }
    }
}

impl SubscriptionApi for TwitchApiClient {
    async fn create_chat_subscription(
        &self,
        credentials: &Credentials,
        session_id: &str,
        channel_id: &str,
    ) -> Result<EventSubSubscription, TwitchError> {
        let req = Self::chat_subscription_request(session_id, channel_id, &credentials.user_id);
        let url = self.url("/eventsub/subscriptions");
        let body = self.authenticated_post(&url, credentials, &req).await?;
        let resp: HelixResponse<EventSubSubscription> = serde_json::from_str(&body)?;
        let subscription = resp.data.into_iter().next().ok_or_else(|| TwitchError::ApiError {
            status: 200,
            message: "subscription response had no data".into(),
        })?;
        tracing::info!(
            subscription_id = %subscription.id,
            channel_id,
            "Subscribed to channel.chat.message"
        );
        Ok(subscription)
    }

    async fn list_subscriptions(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<EventSubSubscription>, TwitchError> {
        let url = self.url("/eventsub/subscriptions");
        let body = self.authenticated_get(&url, credentials).await?;
        let resp: HelixResponse<EventSubSubscription> = serde_json::from_str(&body)?;
        Ok(resp.data)
    }

    async fn delete_subscription(
        &self,
        credentials: &Credentials,
        subscription_id: &str,
    ) -> Result<(), TwitchError> {
        let url = self.url(&format!("/eventsub/subscriptions?id={subscription_id}"));
        self.authenticated_delete(&url, credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_subscription_request_shape() {
        let req = TwitchApiClient::chat_subscription_request("sess-1", "chan-9", "user-7");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "channel.chat.message",
                "version": "1",
                "condition": { "broadcaster_user_id": "chan-9", "user_id": "user-7" },
                "transport": { "method": "websocket", "session_id": "sess-1" },
            })
        );
    }

    #[test]
    fn subscription_list_parses_websocket_entries() {
        let body = r#"{
            "data": [
                {
                    "id": "a",
                    "status": "websocket_disconnected",
                    "type": "channel.chat.message",
                    "version": "1",
                    "condition": {},
                    "transport": { "method": "websocket", "session_id": "old" },
                    "created_at": "2025-01-01T00:00:00Z"
                },
                {
                    "id": "b",
                    "status": "enabled",
                    "type": "channel.follow",
                    "version": "2",
                    "transport": { "method": "webhook" }
                }
            ],
            "total": 2
        }"#;
        let resp: HelixResponse<EventSubSubscription> = serde_json::from_str(body).unwrap();
        assert_eq!(resp.data.len(), 2);
        assert!(resp.data[0].is_websocket());
        assert!(!resp.data[0].is_enabled());
        assert!(!resp.data[1].is_websocket());
        assert!(resp.data[1].is_enabled());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = TwitchApiClient::with_base_url("http://localhost:8080/mock/");
        assert_eq!(
            client.url("/eventsub/subscriptions"),
            "http://localhost:8080/mock/eventsub/subscriptions"
        );
    }
}
