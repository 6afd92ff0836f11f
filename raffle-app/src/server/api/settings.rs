//! Settings API:
//!   GET  /api/settings        – all settings (secrets masked) + feature status
//!   PUT  /api/settings        – update settings
//!   GET  /api/settings/status – feature status only

use std::collections::HashMap;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use super::{ApiError, ApiResult, err_json, ok_json};
use crate::app::SharedState;
use crate::config::SettingsManager;
use crate::events::{self, SettingsUpdatedPayload};

fn settings_body(sm: &SettingsManager) -> Result<Value, ApiError> {
    let settings = sm
        .get_all_settings()
        .map_err(|e| err_json(500, &format!("Failed to get settings: {e}")))?;
    let status = sm
        .check_feature_status()
        .map_err(|e| err_json(500, &format!("Failed to check status: {e}")))?;
    Ok(json!({ "settings": settings, "status": status }))
}

/// GET /api/settings
pub async fn get_settings(State(state): State<SharedState>) -> ApiResult {
    let sm = SettingsManager::new(state.db().clone());
    ok_json(&settings_body(&sm)?)
}

/// PUT /api/settings
pub async fn update_settings(
    State(state): State<SharedState>,
    Json(body): Json<HashMap<String, String>>,
) -> ApiResult {
    let sm = SettingsManager::new(state.db().clone());
    let updated = sm
        .set_settings(&body)
        .map_err(|e| err_json(400, &e.to_string()))?;

    state
        .reload_config()
        .await
        .map_err(|e| err_json(500, &format!("Failed to reload config: {e}")))?;

    events::emit(
        state.ws_sender(),
        events::SETTINGS_UPDATED,
        &SettingsUpdatedPayload {
            source: "api".into(),
            count: updated,
        },
    );
    tracing::info!(count = updated, "Settings updated");

    let mut body = settings_body(&sm)?;
    body["updated"] = json!(updated);
    ok_json(&body)
}

/// GET /api/settings/status
pub async fn get_settings_status(State(state): State<SharedState>) -> ApiResult {
    let sm = SettingsManager::new(state.db().clone());
    let status = sm
        .check_feature_status()
        .map_err(|e| err_json(500, &format!("Failed to check status: {e}")))?;
    ok_json(&status)
}
