//! Background task loops.

use crate::app::SharedState;
use crate::events;

/// Relay supervisor connection state changes to WebSocket clients.
pub async fn connection_state_loop(state: SharedState) {
    let shutdown_token = state.shutdown_token().clone();
    let mut rx = state.supervisor().subscribe_state();

    loop {
        let current = rx.borrow_and_update().clone();
        tracing::debug!(status = ?current.status, "EventSub connection state changed");
        events::emit(state.ws_sender(), events::CONNECTION_STATE, &current);

        tokio::select! {
            _ = shutdown_token.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    tracing::info!("EventSub supervisor stopped");
                    break;
                }
            }
        }
    }
    tracing::info!("Connection state relay stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use raffle_db::Database;
    use serde_json::Value;

    use super::*;
    use crate::bootstrap::build_runtime;
    use crate::config::AppConfig;
    use crate::services::log_buffer::LogBuffer;

    async fn next_connection_state(rx: &mut tokio::sync::broadcast::Receiver<String>) -> Value {
        loop {
            let raw = rx.recv().await.unwrap();
            let value: Value = serde_json::from_str(&raw).unwrap();
            if value["type"] == events::CONNECTION_STATE {
                return value["data"].clone();
            }
        }
    }

    #[tokio::test]
    async fn relays_state_changes_until_cancelled() {
        let config = AppConfig {
            auto_connect: false,
            ..AppConfig::default()
        };
        let state = build_runtime(
            Database::open_in_memory().unwrap(),
            config,
            std::env::temp_dir(),
            LogBuffer::new(10),
        )
        .unwrap()
        .state;
        let mut ws_rx = state.subscribe_ws();

        let relay = tokio::spawn(connection_state_loop(state.clone()));
        let initial = tokio::time::timeout(Duration::from_secs(2), next_connection_state(&mut ws_rx))
            .await
            .unwrap();
        assert_eq!(initial["status"], "disconnected");

        // No credentials: the supervisor reports a configuration error.
        state.supervisor().connect(None).await.unwrap();
        let changed = tokio::time::timeout(Duration::from_secs(2), next_connection_state(&mut ws_rx))
            .await
            .unwrap();
        assert_eq!(changed["status"], "error");

        state.shutdown_token().cancel();
        tokio::time::timeout(Duration::from_secs(2), relay)
            .await
            .unwrap()
            .unwrap();
    }
}
