//! Headless server binary.
//!
//! Starts the EventSub supervisor, the chat ingestion loop and the axum
//! control server, then waits for Ctrl+C.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use live_raffle_lib::services::log_buffer::LogBuffer;
use live_raffle_lib::{bootstrap, server, shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logs = LogBuffer::default();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(logs.layer())
        .init();

    tracing::info!("Starting Live Raffle (headless mode)");

    let (db, config, dir) = bootstrap::init_foundation()?;
    let bootstrap::Runtime {
        state,
        chat_rx,
        supervisor_task,
    } = bootstrap::build_runtime(db, config, dir, logs)?;

    let background = bootstrap::spawn_background_tasks(&state, chat_rx);

    let server_state = state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::start_server(server_state).await {
            tracing::error!("Server failed: {e}");
        }
    });

    tracing::info!(
        port = state.server_port(),
        "Server running. Press Ctrl+C to stop."
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    shutdown::graceful_shutdown(&state, supervisor_task).await;
    if let Err(e) = server_handle.await {
        tracing::warn!("Server task failed: {e}");
    }
    for task in background {
        let _ = task.await;
    }
    Ok(())
}
