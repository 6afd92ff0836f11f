//! WebSocket event names and the `{type, data}` envelope sent to clients.

use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;

pub const RAFFLE_STATE: &str = "raffle_state";
pub const RAFFLE_WINNER: &str = "raffle_winner";
pub const RAFFLE_CONFIG: &str = "raffle_config";
pub const RAFFLE_PARTICIPANT_JOINED: &str = "raffle_participant_joined";
pub const CHAT_MESSAGE: &str = "chat_message";
pub const CONNECTION_STATE: &str = "connection_state";
pub const SETTINGS_UPDATED: &str = "settings_updated";

/// `{"type": event_type, "data": data}` as a JSON string.
pub fn envelope<T: Serialize>(event_type: &str, data: &T) -> Result<String, serde_json::Error> {
    let data = serde_json::to_value(data)?;
    Ok(json!({ "type": event_type, "data": data }).to_string())
}

/// Broadcast an event to every WebSocket client. Having no connected clients
/// is not an error.
pub fn emit<T: Serialize>(tx: &broadcast::Sender<String>, event_type: &str, data: &T) {
    match envelope(event_type, data) {
        Ok(msg) => {
            let _ = tx.send(msg);
        }
        Err(e) => tracing::warn!(event_type, "Failed to serialize event: {e}"),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsUpdatedPayload {
    pub source: String,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_wraps_payload_in_envelope() {
        let (tx, mut rx) = broadcast::channel(4);
        emit(
            &tx,
            SETTINGS_UPDATED,
            &SettingsUpdatedPayload {
                source: "api".into(),
                count: 2,
            },
        );

        let raw = rx.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "settings_updated");
        assert_eq!(value["data"]["count"], 2);
    }

    #[test]
    fn emit_without_receivers_is_silent() {
        let (tx, rx) = broadcast::channel::<String>(4);
        drop(rx);
        emit(&tx, RAFFLE_CONFIG, &json!({}));
    }
}
