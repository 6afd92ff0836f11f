use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use raffle_core::{Badge, ChatMessage};
use raffle_db::Database;
use serde_json::{Value, json};
use tower::ServiceExt;
use twitch_client::eventsub::ConnectionStatus;

use crate::app::SharedState;
use crate::bootstrap::build_runtime;
use crate::config::AppConfig;
use crate::server::router::create_router;
use crate::services::log_buffer::LogBuffer;

fn test_state() -> SharedState {
    let config = AppConfig {
        auto_connect: false,
        ..AppConfig::default()
    };
    let runtime = build_runtime(
        Database::open_in_memory().unwrap(),
        config,
        std::env::temp_dir(),
        LogBuffer::new(50),
    )
    .unwrap();
    runtime.state
}

async fn call(state: &SharedState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let resp = create_router(state.clone())
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn chat(user: &str, text: &str, badges: Vec<Badge>) -> ChatMessage {
    ChatMessage::new(
        format!("m-{user}"),
        format!("{user}-id"),
        user,
        user,
        text,
        Utc::now(),
        badges,
    )
}

#[tokio::test]
async fn status_reports_connection_and_phase() {
    let state = test_state();
    let (status, body) = call(&state, "GET", "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connection"], "disconnected");
    assert_eq!(body["raffle"], "idle");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let state = test_state();
    let (status, _) = call(&state, "GET", "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn raffle_round_trip_over_http() {
    let state = test_state();

    let (status, body) = call(
        &state,
        "PUT",
        "/api/raffle/config",
        Some(json!({ "keyword": "!join" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["keyword"], "!join");

    let (status, body) = call(&state, "POST", "/api/raffle/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "capturing");

    let (status, body) = call(&state, "POST", "/api/raffle/start", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");

    state
        .raffle()
        .ingest(chat("alice", "!join", Vec::new()))
        .unwrap();
    state
        .raffle()
        .ingest(chat("bob", "hello", Vec::new()))
        .unwrap();

    let (_, body) = call(&state, "POST", "/api/raffle/rig", None).await;
    assert_eq!(body["data"]["phase"], "rigged");
    assert_eq!(body["data"]["participants"].as_array().unwrap().len(), 1);

    let (status, body) = call(&state, "POST", "/api/raffle/execute", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["winner"]["username"], "alice");
    assert_eq!(body["data"]["round"], 1);
    assert!(body["data"]["history_id"].is_number());

    // Winners are excluded from later draws by default.
    let (status, body) = call(&state, "POST", "/api/raffle/execute", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "no eligible participants");

    let (_, body) = call(&state, "GET", "/api/raffle/history?limit=5", None).await;
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    let id = history[0]["id"].as_i64().unwrap();

    let (status, _) = call(&state, "DELETE", &format!("/api/raffle/history/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&state, "DELETE", &format!("/api/raffle/history/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&state, "POST", "/api/raffle/reset", None).await;
    assert_eq!(body["data"]["phase"], "idle");
    assert_eq!(body["data"]["round"], 0);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let state = test_state();
    let (status, body) = call(
        &state,
        "PUT",
        "/api/raffle/config",
        Some(json!({ "base_ticket_value": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (_, body) = call(&state, "GET", "/api/raffle/config", None).await;
    assert_eq!(body["data"]["base_ticket_value"], 1);
}

#[tokio::test]
async fn oversized_ticket_values_are_rejected() {
    let state = test_state();
    let (status, body) = call(
        &state,
        "PUT",
        "/api/raffle/config",
        Some(json!({ "subs_extra_tickets": true, "subs_extra_value": 4_000_000_000u32 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("subs_extra_value"));

    let (_, body) = call(&state, "GET", "/api/raffle/config", None).await;
    assert_eq!(body["data"]["subs_extra_tickets"], false);
    assert_eq!(body["data"]["subs_extra_value"], 1);
}

#[tokio::test]
async fn chat_messages_can_be_filtered_to_participants() {
    let state = test_state();
    state
        .raffle()
        .update_config(raffle_core::RaffleConfigUpdate {
            keyword: Some("go".into()),
            ..Default::default()
        })
        .unwrap();
    state.raffle().start_capture().unwrap();
    for (user, text) in [("a", "go"), ("b", "nope"), ("c", "GO")] {
        state
            .raffle()
            .ingest(chat(user, text, vec![Badge::new("vip", "1")]))
            .unwrap();
    }

    let (_, body) = call(&state, "GET", "/api/chat/messages?limit=2", None).await;
    let users: Vec<&str> = body["data"]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["username"].as_str())
        .collect();
    assert_eq!(users, vec!["b", "c"]);

    let (_, body) = call(
        &state,
        "GET",
        "/api/chat/messages?participants_only=true",
        None,
    )
    .await;
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["messages"][0]["is_participant"], true);
}

#[tokio::test]
async fn connect_without_credentials_reports_error() {
    let state = test_state();
    let (status, body) = call(&state, "GET", "/api/connection", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "disconnected");

    let (status, _) = call(&state, "POST", "/api/connection/connect", None).await;
    assert_eq!(status, StatusCode::OK);

    let mut rx = state.supervisor().subscribe_state();
    let reached = tokio::time::timeout(
        Duration::from_secs(2),
        rx.wait_for(|s| s.status == ConnectionStatus::Error),
    )
    .await
    .is_ok();
    assert!(reached);
    let error = state.supervisor().state().error.unwrap_or_default();
    assert!(error.contains("credential"), "unexpected error: {error}");
}

#[tokio::test]
async fn switch_requires_channel_id() {
    let state = test_state();
    let (status, _) = call(
        &state,
        "POST",
        "/api/connection/switch",
        Some(json!({ "channel_id": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_update_validates_and_masks() {
    let state = test_state();

    let (status, _) = call(
        &state,
        "PUT",
        "/api/settings",
        Some(json!({ "SERVER_PORT": "not-a-port" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &state,
        "PUT",
        "/api/settings",
        Some(json!({ "ACCESS_TOKEN": "secret-token", "CHAT_HISTORY_CAPACITY": "20" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], 2);
    assert_eq!(body["data"]["settings"]["ACCESS_TOKEN"]["value"], "********");
    assert_eq!(body["data"]["settings"]["CHAT_HISTORY_CAPACITY"]["value"], "20");
    assert_eq!(body["data"]["status"]["twitch_configured"], false);

    assert_eq!(state.config().await.access_token, "secret-token");

    let (_, body) = call(&state, "GET", "/api/settings/status", None).await;
    let missing = body["data"]["missing_settings"].as_array().unwrap();
    assert!(missing.iter().any(|k| k == "CLIENT_ID"));
    assert!(!missing.iter().any(|k| k == "ACCESS_TOKEN"));
}

#[tokio::test]
async fn target_channel_change_reaches_the_supervisor() {
    let state = test_state();
    let mut connection = state.supervisor().subscribe_state();
    assert_eq!(connection.borrow().channel_id, None);

    let (status, _) = call(
        &state,
        "PUT",
        "/api/settings",
        Some(json!({ "TARGET_CHANNEL_ID": "12345" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let updated = tokio::time::timeout(
        Duration::from_secs(1),
        connection.wait_for(|s| s.channel_id.as_deref() == Some("12345")),
    )
    .await
    .map(|changed| changed.is_ok());
    assert!(matches!(updated, Ok(true)));
    // Idle supervisor: the channel is remembered without connecting.
    assert_eq!(state.supervisor().state().status, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn logs_endpoint_validates_level() {
    let state = test_state();
    let (status, body) = call(&state, "GET", "/api/logs?limit=10&level=warn", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["limit"], 10);

    let (status, _) = call(&state, "GET", "/api/logs?level=loud", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&state, "POST", "/api/logs/clear", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cleared"], 0);
}
