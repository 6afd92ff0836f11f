use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use super::{api, websocket};
use crate::app::SharedState;

/// Create the axum router with all routes.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // --- Core ---
        .route("/status", get(status_handler))
        .route("/ws", get(websocket::ws_handler))
        // --- Raffle ---
        .route("/api/raffle", get(api::raffle::get_raffle))
        .route("/api/raffle/start", post(api::raffle::start_capture))
        .route("/api/raffle/stop", post(api::raffle::stop_capture))
        .route("/api/raffle/rig", post(api::raffle::rig))
        .route("/api/raffle/execute", post(api::raffle::execute))
        .route("/api/raffle/clear", post(api::raffle::clear_participants))
        .route("/api/raffle/reset", post(api::raffle::reset))
        .route("/api/raffle/config", get(api::raffle::get_config).put(api::raffle::update_config))
        .route("/api/raffle/history", get(api::raffle::get_history).delete(api::raffle::clear_history))
        .route("/api/raffle/history/{id}", delete(api::raffle::delete_history))
        // --- Chat ---
        .route("/api/chat/messages", get(api::chat::get_messages))
        // --- Connection ---
        .route("/api/connection", get(api::connection::get_connection))
        .route("/api/connection/connect", post(api::connection::connect))
        .route("/api/connection/disconnect", post(api::connection::disconnect))
        .route("/api/connection/toggle", post(api::connection::toggle))
        .route("/api/connection/switch", post(api::connection::switch_channel))
        // --- Settings ---
        .route("/api/settings", get(api::settings::get_settings).put(api::settings::update_settings))
        .route("/api/settings/status", get(api::settings::get_settings_status))
        // --- Logs ---
        .route("/api/logs", get(api::logs::get_logs))
        .route("/api/logs/clear", post(api::logs::clear_logs))
        // --- Middleware ---
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn status_handler(State(state): State<SharedState>) -> Json<Value> {
    let connection = state.supervisor().state();
    let phase = state.raffle().snapshot().ok().map(|s| s.phase);
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connection": connection.status,
        "raffle": phase,
        "data_dir": state.data_dir(),
    }))
}
