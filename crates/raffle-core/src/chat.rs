//! Chat message model and the bounded chat history buffer.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const BADGE_MODERATOR: &str = "moderator";
pub const BADGE_SUBSCRIBER: &str = "subscriber";
pub const BADGE_VIP: &str = "vip";

/// Default number of messages kept by [`ChatLog`].
pub const DEFAULT_CHAT_LOG_CAPACITY: usize = 100;

/// A chat badge as delivered by EventSub (`set_id` is the role, e.g. `subscriber`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Badge {
    pub set_id: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub info: String,
}

impl Badge {
    pub fn new(set_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            set_id: set_id.into(),
            id: id.into(),
            info: String::new(),
        }
    }

    /// `"set_id/id"`, or just `set_id` when the badge has no version.
    pub fn key(&self) -> String {
        if self.id.is_empty() {
            self.set_id.clone()
        } else {
            format!("{}/{}", self.set_id, self.id)
        }
    }
}

/// Chat message category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    ChannelPointsHighlighted,
    ChannelPointsSubOnly,
    UserIntro,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cheer {
    pub bits: u32,
}

/// A single inbound chat message.
///
/// Only `is_participant` changes after creation; it is assigned when the
/// message is ingested by the raffle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub message_id: String,
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
    pub color: String,
    pub badges: Vec<Badge>,
    pub kind: MessageKind,
    pub cheer: Option<Cheer>,
    pub is_participant: bool,
}

impl ChatMessage {
    /// Build a message, dropping duplicate and blank badges while keeping
    /// their original order.
    pub fn new(
        message_id: impl Into<String>,
        user_id: impl Into<String>,
        username: impl Into<String>,
        display_name: impl Into<String>,
        text: impl Into<String>,
        received_at: DateTime<Utc>,
        badges: Vec<Badge>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            user_id: user_id.into(),
            username: username.into(),
            display_name: display_name.into(),
            text: text.into(),
            received_at,
            color: String::new(),
            badges: normalize_badges(badges),
            kind: MessageKind::Text,
            cheer: None,
            is_participant: false,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_cheer(mut self, bits: u32) -> Self {
        self.cheer = Some(Cheer { bits });
        self
    }

    pub fn has_badge(&self, set_id: &str) -> bool {
        has_badge(&self.badges, set_id)
    }
}

pub fn has_badge(badges: &[Badge], set_id: &str) -> bool {
    badges.iter().any(|badge| badge.set_id == set_id)
}

fn normalize_badges(badges: Vec<Badge>) -> Vec<Badge> {
    let mut seen = HashSet::new();
    badges
        .into_iter()
        .filter_map(|mut badge| {
            badge.set_id = badge.set_id.trim().to_string();
            badge.id = badge.id.trim().to_string();
            if badge.set_id.is_empty() || !seen.insert(badge.key()) {
                return None;
            }
            Some(badge)
        })
        .collect()
}

/// Ring buffer of the most recent chat messages.
#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHAT_LOG_CAPACITY)
    }
}

impl ChatLog {
    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message, evicting the oldest one past capacity.
    pub fn push(&mut self, message: ChatMessage) {
        if self.messages.len() >= self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The newest `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ChatMessage> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str) -> ChatMessage {
        ChatMessage::new(id, "u1", "alice", "Alice", "hi", Utc::now(), Vec::new())
    }

    #[test]
    fn badges_are_trimmed_and_deduplicated_in_order() {
        let msg = ChatMessage::new(
            "m1",
            "u1",
            "alice",
            "Alice",
            "hi",
            Utc::now(),
            vec![
                Badge::new(" subscriber ", "12"),
                Badge::new("", "1"),
                Badge::new("vip", "1"),
                Badge::new("subscriber", "12"),
            ],
        );

        let keys: Vec<String> = msg.badges.iter().map(Badge::key).collect();
        assert_eq!(keys, vec!["subscriber/12", "vip/1"]);
        assert!(msg.has_badge(BADGE_SUBSCRIBER));
        assert!(!msg.has_badge(BADGE_MODERATOR));
    }

    #[test]
    fn chat_log_evicts_oldest_past_capacity() {
        let mut log = ChatLog::with_capacity(3);
        for idx in 0..5 {
            log.push(message(&format!("m{idx}")));
        }

        assert_eq!(log.len(), 3);
        let ids: Vec<String> = log.iter().map(|m| m.message_id.clone()).collect();
        assert_eq!(ids, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn chat_log_recent_returns_newest_oldest_first() {
        let mut log = ChatLog::default();
        assert_eq!(log.capacity(), DEFAULT_CHAT_LOG_CAPACITY);
        for idx in 0..4 {
            log.push(message(&format!("m{idx}")));
        }

        let recent = log.recent(2);
        assert_eq!(recent[0].message_id, "m2");
        assert_eq!(recent[1].message_id, "m3");
        assert_eq!(log.recent(50).len(), 4);
    }

    #[test]
    fn message_kind_unknown_values_map_to_other() {
        let kind: MessageKind = serde_json::from_str("\"power_ups_gigantified_emote\"").unwrap();
        assert_eq!(kind, MessageKind::Other);
        let kind: MessageKind = serde_json::from_str("\"channel_points_sub_only\"").unwrap();
        assert_eq!(kind, MessageKind::ChannelPointsSubOnly);
    }
}
