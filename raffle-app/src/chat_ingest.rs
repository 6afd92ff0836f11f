//! Chat ingestion loop: EventSub chat events into the raffle store.

use chrono::{DateTime, Utc};
use raffle_core::{Badge, ChatMessage, MessageKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use twitch_client::eventsub::ChatMessageEvent;

use crate::raffle_store::RaffleStore;

/// Convert an EventSub chat event. The display name falls back to the login.
pub fn to_chat_message(event: &ChatMessageEvent, received_at: DateTime<Utc>) -> ChatMessage {
    let display_name = if event.chatter_user_name.is_empty() {
        &event.chatter_user_login
    } else {
        &event.chatter_user_name
    };
    let badges = event
        .badges
        .iter()
        .map(|b| Badge {
            set_id: b.set_id.clone(),
            id: b.id.clone(),
            info: b.info.clone(),
        })
        .collect();

    let message = ChatMessage::new(
        event.message_id.clone(),
        event.chatter_user_id.clone(),
        event.chatter_user_login.clone(),
        display_name.clone(),
        event.message.text.clone(),
        received_at,
        badges,
    )
    .with_color(event.color.clone())
    .with_kind(message_kind(&event.message_type));

    match &event.cheer {
        Some(cheer) => message.with_cheer(cheer.bits),
        None => message,
    }
}

fn message_kind(message_type: &str) -> MessageKind {
    match message_type {
        "" | "text" => MessageKind::Text,
        "channel_points_highlighted" => MessageKind::ChannelPointsHighlighted,
        "channel_points_sub_only" => MessageKind::ChannelPointsSubOnly,
        "user_intro" => MessageKind::UserIntro,
        _ => MessageKind::Other,
    }
}

/// Feed chat events into the store until shutdown or until the supervisor
/// drops its sender.
pub async fn run(
    store: RaffleStore,
    mut chat_rx: mpsc::Receiver<ChatMessageEvent>,
    shutdown: CancellationToken,
) {
    tracing::info!("Chat ingestion started");
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = chat_rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let message = to_chat_message(&event, Utc::now());
        if let Err(e) = store.ingest(message) {
            tracing::error!(message_id = %event.message_id, "Failed to ingest chat message: {e}");
        }
    }
    tracing::info!("Chat ingestion stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use raffle_core::RaffleConfigUpdate;
    use raffle_db::Database;
    use serde_json::json;
    use tokio::sync::broadcast;

    use super::*;

    fn event(user: &str, text: &str) -> ChatMessageEvent {
        serde_json::from_value(json!({
            "broadcaster_user_id": "1",
            "broadcaster_user_login": "streamer",
            "broadcaster_user_name": "Streamer",
            "chatter_user_id": format!("{user}-id"),
            "chatter_user_login": user,
            "chatter_user_name": "",
            "message_id": format!("m-{user}"),
            "message": { "text": text, "fragments": [{ "type": "text", "text": text }] },
            "color": "#FF0000",
            "badges": [
                { "set_id": "vip", "id": "1", "info": "" },
                { "set_id": "vip", "id": "1", "info": "" }
            ],
            "message_type": "channel_points_highlighted",
            "cheer": { "bits": 50 }
        }))
        .unwrap()
    }

    #[test]
    fn converts_event_fields() {
        let now = Utc::now();
        let message = to_chat_message(&event("alice", "!join"), now);
        assert_eq!(message.user_id, "alice-id");
        assert_eq!(message.username, "alice");
        assert_eq!(message.display_name, "alice");
        assert_eq!(message.text, "!join");
        assert_eq!(message.color, "#FF0000");
        assert_eq!(message.badges.len(), 1);
        assert!(message.has_badge("vip"));
        assert_eq!(message.kind, MessageKind::ChannelPointsHighlighted);
        assert_eq!(message.cheer.map(|c| c.bits), Some(50));
        assert_eq!(message.received_at, now);
        assert!(!message.is_participant);
    }

    #[test]
    fn unknown_message_type_is_other() {
        assert_eq!(message_kind("power_ups_gigantified_emote"), MessageKind::Other);
        assert_eq!(message_kind(""), MessageKind::Text);
    }

    #[tokio::test]
    async fn loop_ingests_until_cancelled() {
        let (tx, _rx) = broadcast::channel(16);
        let store = RaffleStore::new(Database::open_in_memory().unwrap(), 10, tx).unwrap();
        store
            .update_config(RaffleConfigUpdate {
                keyword: Some("!join".into()),
                ..Default::default()
            })
            .unwrap();
        store.start_capture().unwrap();

        let (chat_tx, chat_rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let task = tokio::spawn(run(store.clone(), chat_rx, token.clone()));

        chat_tx.send(event("alice", "!join")).await.unwrap();
        chat_tx.send(event("bob", "hello")).await.unwrap();

        for _ in 0..50 {
            if store.recent_chat(10).unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.participants.len(), 1);
        assert_eq!(snapshot.participants[0].username, "alice");

        token.cancel();
        task.await.unwrap();
    }
}
