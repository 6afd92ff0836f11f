use std::path::PathBuf;
use std::sync::Arc;

use raffle_db::Database;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use twitch_client::eventsub::SupervisorHandle;

use crate::config::{AppConfig, SettingsManager};
use crate::raffle_store::RaffleStore;
use crate::services::log_buffer::LogBuffer;

/// Application shared state accessible from axum handlers and background tasks.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    /// Broadcast channel for WebSocket messages
    ws_tx: broadcast::Sender<String>,
    /// Application configuration (reloadable)
    config: RwLock<AppConfig>,
    db: Database,
    data_dir: PathBuf,
    raffle: RaffleStore,
    supervisor: SupervisorHandle,
    logs: LogBuffer,
    shutdown_token: CancellationToken,
}

impl SharedState {
    /// `ws_tx` must be the sender the raffle store broadcasts on.
    pub fn new(
        db: Database,
        config: AppConfig,
        data_dir: PathBuf,
        ws_tx: broadcast::Sender<String>,
        raffle: RaffleStore,
        supervisor: SupervisorHandle,
        logs: LogBuffer,
    ) -> Self {
        Self {
            inner: Arc::new(SharedStateInner {
                ws_tx,
                config: RwLock::new(config),
                db,
                data_dir,
                raffle,
                supervisor,
                logs,
                shutdown_token: CancellationToken::new(),
            }),
        }
    }

    pub fn server_port(&self) -> u16 {
        self.inner
            .config
            .try_read()
            .map(|c| c.server_port)
            .unwrap_or(8090)
    }

    pub fn ws_sender(&self) -> &broadcast::Sender<String> {
        &self.inner.ws_tx
    }

    pub fn subscribe_ws(&self) -> broadcast::Receiver<String> {
        self.inner.ws_tx.subscribe()
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.inner.data_dir
    }

    pub fn raffle(&self) -> &RaffleStore {
        &self.inner.raffle
    }

    pub fn supervisor(&self) -> &SupervisorHandle {
        &self.inner.supervisor
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.inner.logs
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown_token
    }

    /// Get a read lock on the current config.
    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.config.read().await
    }

    /// Reload config from the database. Changed credentials and target
    /// channel are handed to the supervisor; the EventSub URL and retry
    /// policy are fixed when the supervisor starts.
    pub async fn reload_config(&self) -> Result<(), anyhow::Error> {
        let sm = SettingsManager::new(self.inner.db.clone());
        let (before, after) = {
            let mut config = self.inner.config.write().await;
            let before = config.supervisor_config();
            config.reload(&sm)?;
            (before, config.supervisor_config())
        };

        if before.credentials != after.credentials {
            tracing::info!("Twitch credentials changed, updating EventSub supervisor");
            self.inner
                .supervisor
                .set_credentials(after.credentials)
                .await?;
        }
        if before.channel_id != after.channel_id {
            tracing::info!(channel_id = ?after.channel_id, "Target channel changed");
            self.inner.supervisor.set_channel(after.channel_id).await?;
        }
        if before.url != after.url || before.retry != after.retry {
            tracing::warn!("EventSub URL or reconnect policy changed; takes effect after restart");
        }
        Ok(())
    }
}
