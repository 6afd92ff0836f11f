use std::time::Duration;

use tokio::task::JoinHandle;

use crate::app::SharedState;

const SUPERVISOR_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Cancel background loops, stop the HTTP server and tear down the EventSub
/// connection.
pub async fn graceful_shutdown(state: &SharedState, supervisor_task: JoinHandle<()>) {
    tracing::info!("Shutdown sequence started");

    state.shutdown_token().cancel();
    tracing::info!("Shutdown: background loops cancelled");

    match state.supervisor().shutdown().await {
        Ok(()) => tracing::info!("Shutdown: EventSub stop signal sent"),
        Err(e) => tracing::warn!("Shutdown: failed to send EventSub stop signal: {e}"),
    }

    match tokio::time::timeout(SUPERVISOR_STOP_TIMEOUT, supervisor_task).await {
        Ok(Ok(())) => tracing::info!("Shutdown: EventSub supervisor stopped"),
        Ok(Err(e)) => tracing::warn!("Shutdown: EventSub supervisor task failed: {e}"),
        Err(_) => tracing::warn!("Shutdown: EventSub supervisor did not stop in time"),
    }

    tracing::info!("Shutdown sequence completed");
}

#[cfg(test)]
mod tests {
    use raffle_db::Database;

    use super::*;
    use crate::bootstrap::{build_runtime, spawn_background_tasks};
    use crate::config::AppConfig;
    use crate::services::log_buffer::LogBuffer;

    #[tokio::test]
    async fn stops_supervisor_and_background_tasks() {
        let config = AppConfig {
            auto_connect: false,
            ..AppConfig::default()
        };
        let runtime = build_runtime(
            Database::open_in_memory().unwrap(),
            config,
            std::env::temp_dir(),
            LogBuffer::new(10),
        )
        .unwrap();
        let tasks = spawn_background_tasks(&runtime.state, runtime.chat_rx);

        graceful_shutdown(&runtime.state, runtime.supervisor_task).await;

        assert!(runtime.state.shutdown_token().is_cancelled());
        for task in tasks {
            tokio::time::timeout(Duration::from_secs(2), task)
                .await
                .unwrap()
                .unwrap();
        }
        // The supervisor is gone, so further commands fail.
        assert!(runtime.state.supervisor().disconnect().await.is_err());
    }
}
