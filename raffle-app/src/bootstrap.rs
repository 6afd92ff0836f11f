use std::path::PathBuf;
use std::sync::Arc;

use raffle_db::Database;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use twitch_client::api::{SubscriptionApi, TwitchApiClient};
use twitch_client::eventsub::{ChatMessageEvent, Connector, Supervisor, TungsteniteConnector};

use crate::app::SharedState;
use crate::background;
use crate::chat_ingest;
use crate::config::{AppConfig, SettingsManager};
use crate::raffle_store::RaffleStore;
use crate::services::log_buffer::LogBuffer;

const WS_CHANNEL_CAPACITY: usize = 1024;

/// Shared state plus the pieces the background tasks take ownership of.
pub struct Runtime {
    pub state: SharedState,
    pub chat_rx: mpsc::Receiver<ChatMessageEvent>,
    pub supervisor_task: JoinHandle<()>,
}

/// Load `.env`, open the database, migrate settings, load config (fatal on error).
pub fn init_foundation() -> Result<(Database, AppConfig, PathBuf), anyhow::Error> {
    load_dotenv();
    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;

    let db_path = dir.join("raffle.db");
    tracing::info!("Opening database at {}", db_path.display());
    let db = Database::open(&db_path)?;

    let sm = SettingsManager::new(db.clone());
    if let Err(e) = sm.migrate_from_env() {
        tracing::error!("Failed to migrate from env: {e}");
    }
    sm.initialize_defaults()?;

    let config = AppConfig::load(&sm)?;

    if let Ok(status) = sm.check_feature_status() {
        if !status.missing_settings.is_empty() {
            tracing::warn!(
                "Missing settings: {:?}, warnings: {:?}",
                status.missing_settings,
                status.warnings
            );
        }
    }

    tracing::info!("Settings loaded (port={})", config.server_port);
    Ok((db, config, dir))
}

/// Production wiring: tokio-tungstenite socket and the Helix API client.
pub fn build_runtime(
    db: Database,
    config: AppConfig,
    dir: PathBuf,
    logs: LogBuffer,
) -> Result<Runtime, anyhow::Error> {
    build_runtime_with(
        db,
        config,
        dir,
        logs,
        Arc::new(TungsteniteConnector),
        Arc::new(TwitchApiClient::new()),
    )
}

/// Create the raffle store and start the connection supervisor.
pub fn build_runtime_with<C: Connector, A: SubscriptionApi>(
    db: Database,
    config: AppConfig,
    dir: PathBuf,
    logs: LogBuffer,
    connector: Arc<C>,
    api: Arc<A>,
) -> Result<Runtime, anyhow::Error> {
    let (ws_tx, _) = broadcast::channel(WS_CHANNEL_CAPACITY);
    let raffle = RaffleStore::new(db.clone(), config.chat_history_capacity, ws_tx.clone())?;
    let (supervisor, chat_rx, supervisor_task) =
        Supervisor::spawn(connector, api, config.supervisor_config());

    let state = SharedState::new(db, config, dir, ws_tx, raffle, supervisor, logs);
    Ok(Runtime {
        state,
        chat_rx,
        supervisor_task,
    })
}

/// Spawn chat ingestion and the connection status relay.
pub fn spawn_background_tasks(
    state: &SharedState,
    chat_rx: mpsc::Receiver<ChatMessageEvent>,
) -> Vec<JoinHandle<()>> {
    let ingest = tokio::spawn(chat_ingest::run(
        state.raffle().clone(),
        chat_rx,
        state.shutdown_token().clone(),
    ));

    let s = state.clone();
    let relay = tokio::spawn(async move { background::connection_state_loop(s).await });

    vec![ingest, relay]
}

/// Determine the data directory for the application.
/// Priority: LIVE_RAFFLE_DATA_DIR env var > ~/.live-raffle
fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LIVE_RAFFLE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".live-raffle")
}

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let candidates = [".env", "../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}
