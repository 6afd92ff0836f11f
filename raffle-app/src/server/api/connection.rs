//! EventSub connection control API. Commands are queued to the supervisor;
//! the resulting state arrives over the WebSocket as `connection_state`.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use twitch_client::TwitchError;

use super::{ApiError, ApiResult, err_json, ok_json};
use crate::app::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectRequest {
    pub channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    pub channel_id: String,
}

fn supervisor_err(e: TwitchError) -> ApiError {
    err_json(503, &format!("EventSub supervisor unavailable: {e}"))
}

fn current(state: &SharedState) -> ApiResult {
    ok_json(&state.supervisor().state())
}

/// GET /api/connection
pub async fn get_connection(State(state): State<SharedState>) -> ApiResult {
    current(&state)
}

/// POST /api/connection/connect
pub async fn connect(
    State(state): State<SharedState>,
    body: Option<Json<ConnectRequest>>,
) -> ApiResult {
    let channel_id = body
        .and_then(|Json(req)| req.channel_id)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    state
        .supervisor()
        .connect(channel_id)
        .await
        .map_err(supervisor_err)?;
    current(&state)
}

/// POST /api/connection/disconnect
pub async fn disconnect(State(state): State<SharedState>) -> ApiResult {
    state
        .supervisor()
        .disconnect()
        .await
        .map_err(supervisor_err)?;
    current(&state)
}

/// POST /api/connection/toggle
pub async fn toggle(State(state): State<SharedState>) -> ApiResult {
    state.supervisor().toggle().await.map_err(supervisor_err)?;
    current(&state)
}

/// POST /api/connection/switch
pub async fn switch_channel(
    State(state): State<SharedState>,
    Json(req): Json<SwitchRequest>,
) -> ApiResult {
    let channel_id = req.channel_id.trim();
    if channel_id.is_empty() {
        return Err(err_json(400, "channel_id is required"));
    }
    state
        .supervisor()
        .switch_channel(channel_id)
        .await
        .map_err(supervisor_err)?;
    current(&state)
}
