//! Log viewing API backed by the in-memory log buffer.

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;
use tracing::Level;

use super::{ApiResult, err_json, ok_json};
use crate::app::SharedState;

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
    /// Minimum level: `error`, `warn`, `info`, `debug` or `trace`.
    pub level: Option<String>,
}

/// GET /api/logs
pub async fn get_logs(State(state): State<SharedState>, Query(q): Query<LogQuery>) -> ApiResult {
    let limit = q.limit.unwrap_or(100);
    let min_level = match q.level.as_deref() {
        None | Some("") => None,
        Some(level) => Some(
            level
                .parse::<Level>()
                .map_err(|_| err_json(400, &format!("invalid log level: {level}")))?,
        ),
    };

    let logs = state.logs().recent(limit, min_level);
    ok_json(&json!({
        "logs": logs,
        "count": logs.len(),
        "limit": limit,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// POST /api/logs/clear
pub async fn clear_logs(State(state): State<SharedState>) -> ApiResult {
    let cleared = state.logs().clear();
    ok_json(&json!({ "cleared": cleared }))
}
