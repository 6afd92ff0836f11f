//! Raffle control API:
//!   GET    /api/raffle              – current raffle state
//!   POST   /api/raffle/{start,stop,rig,execute,clear,reset}
//!   GET    /api/raffle/config       – current config (including keyword)
//!   PUT    /api/raffle/config       – partial config update
//!   GET    /api/raffle/history      – winner history, newest first
//!   DELETE /api/raffle/history      – clear winner history
//!   DELETE /api/raffle/history/{id}

use axum::Json;
use axum::extract::{Path, Query, State};
use raffle_core::RaffleConfigUpdate;
use serde::Deserialize;
use serde_json::json;

use super::{ApiError, ApiResult, err_json, ok_json};
use crate::app::SharedState;
use crate::raffle_store::StoreError;

const DEFAULT_HISTORY_LIMIT: usize = 50;

fn store_err(e: StoreError) -> ApiError {
    err_json(e.status_code(), &e.to_string())
}

/// GET /api/raffle
pub async fn get_raffle(State(state): State<SharedState>) -> ApiResult {
    let snapshot = state.raffle().snapshot().map_err(store_err)?;
    ok_json(&snapshot)
}

/// POST /api/raffle/start
pub async fn start_capture(State(state): State<SharedState>) -> ApiResult {
    let snapshot = state.raffle().start_capture().map_err(store_err)?;
    ok_json(&snapshot)
}

/// POST /api/raffle/stop
pub async fn stop_capture(State(state): State<SharedState>) -> ApiResult {
    let snapshot = state.raffle().stop_capture().map_err(store_err)?;
    ok_json(&snapshot)
}

/// POST /api/raffle/rig
pub async fn rig(State(state): State<SharedState>) -> ApiResult {
    let snapshot = state.raffle().rig().map_err(store_err)?;
    ok_json(&snapshot)
}

/// POST /api/raffle/execute
pub async fn execute(State(state): State<SharedState>) -> ApiResult {
    let outcome = state.raffle().execute().map_err(store_err)?;
    ok_json(&outcome)
}

/// POST /api/raffle/clear
pub async fn clear_participants(State(state): State<SharedState>) -> ApiResult {
    let snapshot = state.raffle().clear_participants().map_err(store_err)?;
    ok_json(&snapshot)
}

/// POST /api/raffle/reset
pub async fn reset(State(state): State<SharedState>) -> ApiResult {
    let snapshot = state.raffle().reset().map_err(store_err)?;
    ok_json(&snapshot)
}

/// GET /api/raffle/config
pub async fn get_config(State(state): State<SharedState>) -> ApiResult {
    let config = state.raffle().config().map_err(store_err)?;
    ok_json(&config)
}

/// PUT /api/raffle/config
pub async fn update_config(
    State(state): State<SharedState>,
    Json(update): Json<RaffleConfigUpdate>,
) -> ApiResult {
    let config = state.raffle().update_config(update).map_err(store_err)?;
    ok_json(&config)
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// GET /api/raffle/history
pub async fn get_history(
    State(state): State<SharedState>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult {
    let history = state
        .raffle()
        .history(q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .map_err(store_err)?;
    ok_json(&history)
}

/// DELETE /api/raffle/history
pub async fn clear_history(State(state): State<SharedState>) -> ApiResult {
    let cleared = state.raffle().clear_history().map_err(store_err)?;
    ok_json(&json!({ "cleared": cleared }))
}

/// DELETE /api/raffle/history/{id}
pub async fn delete_history(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> ApiResult {
    match state.raffle().delete_history(id) {
        Ok(()) => ok_json(&json!({ "deleted": id })),
        Err(StoreError::Db(raffle_db::DbError::NotFound(what))) => {
            Err(err_json(404, &format!("{what} not found")))
        }
        Err(e) => Err(store_err(e)),
    }
}
