//! Chat history API.

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;

use super::{ApiResult, err_json, ok_json};
use crate::app::SharedState;

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<usize>,
    /// Only messages that entered their sender into the raffle.
    #[serde(default)]
    pub participants_only: bool,
}

/// GET /api/chat/messages
pub async fn get_messages(
    State(state): State<SharedState>,
    Query(q): Query<MessagesQuery>,
) -> ApiResult {
    let store = state.raffle();
    let capacity = store.chat_capacity().map_err(|e| err_json(500, &e.to_string()))?;
    let limit = q.limit.unwrap_or(capacity).min(capacity);

    let mut messages = store
        .recent_chat(capacity)
        .map_err(|e| err_json(500, &e.to_string()))?;
    if q.participants_only {
        messages.retain(|m| m.is_participant);
    }
    let skip = messages.len().saturating_sub(limit);
    let messages: Vec<_> = messages.into_iter().skip(skip).collect();

    ok_json(&json!({
        "messages": messages,
        "count": messages.len(),
        "capacity": capacity,
    }))
}
