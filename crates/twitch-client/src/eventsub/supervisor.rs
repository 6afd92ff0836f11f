//! Connection supervisor: retry/backoff, chat subscription registration and
//! connection status on top of [`EventSubTransport`].
//!
//! Everything runs in one task driven by [`SupervisorCommand`]s, transport
//! events and the supervisor's own timers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Sleep, error::Elapsed};

use super::frame::ChatMessageEvent;
use super::socket::Connector;
use super::transport::{EventSubTransport, TransportEvent, TransportHandle};
use super::{EVENTSUB_URL, SUBSCRIPTION_WINDOW, TransportError};
use crate::api::{EventSubSubscription, SubscriptionApi};
use crate::{Credentials, TwitchError};

const COMMAND_BUFFER: usize = 32;
const CHAT_BUFFER: usize = 256;

/// Exponential backoff: `base_delay * 2^attempt`, at most `max_attempts` retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Attempt counter for the current failure streak.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay for the next attempt, or `None` once the policy is exhausted.
    pub fn next_delay(&mut self, policy: &RetryPolicy) -> Option<Duration> {
        if self.attempts >= policy.max_attempts {
            return None;
        }
        let delay = policy.delay_for(self.attempts);
        self.attempts += 1;
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub error: Option<String>,
    pub session_id: Option<String>,
    pub subscription_id: Option<String>,
    pub channel_id: Option<String>,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub url: String,
    pub retry: RetryPolicy,
    pub auto_connect: bool,
    /// Channel to read; the authenticated user's own channel when unset.
    pub channel_id: Option<String>,
    pub credentials: Option<Credentials>,
    pub subscription_window: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            url: EVENTSUB_URL.to_string(),
            retry: RetryPolicy::default(),
            auto_connect: true,
            channel_id: None,
            credentials: None,
            subscription_window: SUBSCRIPTION_WINDOW,
        }
    }
}

#[derive(Debug)]
pub enum SupervisorCommand {
    Connect { channel_id: Option<String> },
    Disconnect,
    Toggle,
    SwitchChannel(String),
    SetChannel(Option<String>),
    SetCredentials(Option<Credentials>),
    Shutdown,
}

/// Cloneable control handle for the supervisor task.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    commands: mpsc::Sender<SupervisorCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl SupervisorHandle {
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub async fn connect(&self, channel_id: Option<String>) -> Result<(), TwitchError> {
        self.send(SupervisorCommand::Connect { channel_id }).await
    }

    pub async fn disconnect(&self) -> Result<(), TwitchError> {
        self.send(SupervisorCommand::Disconnect).await
    }

    pub async fn toggle(&self) -> Result<(), TwitchError> {
        self.send(SupervisorCommand::Toggle).await
    }

    pub async fn switch_channel(&self, channel_id: impl Into<String>) -> Result<(), TwitchError> {
        self.send(SupervisorCommand::SwitchChannel(channel_id.into()))
            .await
    }

    /// Change the configured channel. A running connection moves over to it;
    /// an idle supervisor just remembers it for the next connect.
    pub async fn set_channel(&self, channel_id: Option<String>) -> Result<(), TwitchError> {
        self.send(SupervisorCommand::SetChannel(channel_id)).await
    }

    pub async fn set_credentials(&self, credentials: Option<Credentials>) -> Result<(), TwitchError> {
        self.send(SupervisorCommand::SetCredentials(credentials))
            .await
    }

    pub async fn shutdown(&self) -> Result<(), TwitchError> {
        self.send(SupervisorCommand::Shutdown).await
    }

    async fn send(&self, command: SupervisorCommand) -> Result<(), TwitchError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| TwitchError::Transport(TransportError::Closed))
    }
}

type SubscribeResult = Result<Result<EventSubSubscription, TwitchError>, Elapsed>;
type PendingSubscription = Pin<Box<dyn Future<Output = SubscribeResult> + Send>>;

struct ActiveTransport {
    handle: TransportHandle,
    events: mpsc::Receiver<TransportEvent>,
}

pub struct Supervisor<C: Connector, A: SubscriptionApi> {
    connector: Arc<C>,
    api: Arc<A>,
    config: SupervisorConfig,
    credentials: Option<Credentials>,
    transport: Option<ActiveTransport>,
    subscribe: Option<PendingSubscription>,
    retry: RetryState,
    retry_timer: Option<Pin<Box<Sleep>>>,
    /// Set when backoff ran out; auto-connect stays off until a user connect.
    exhausted: bool,
    /// A channel switch disconnected us; reconnect on the next loop turn.
    switch_pending: bool,
    state: watch::Sender<ConnectionState>,
    chat_tx: mpsc::Sender<ChatMessageEvent>,
    commands: mpsc::Receiver<SupervisorCommand>,
}

impl<C: Connector, A: SubscriptionApi> Supervisor<C, A> {
    /// Start the supervisor task. Chat message events arrive on the returned
    /// receiver.
    pub fn spawn(
        connector: Arc<C>,
        api: Arc<A>,
        config: SupervisorConfig,
    ) -> (
        SupervisorHandle,
        mpsc::Receiver<ChatMessageEvent>,
        JoinHandle<()>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (chat_tx, chat_rx) = mpsc::channel(CHAT_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState {
            channel_id: config.channel_id.clone(),
            ..Default::default()
        });

        let supervisor = Self {
            connector,
            api,
            credentials: config.credentials.clone(),
            config,
            transport: None,
            subscribe: None,
            retry: RetryState::default(),
            retry_timer: None,
            exhausted: false,
            switch_pending: false,
            state: state_tx,
            chat_tx,
            commands: command_rx,
        };
        let task = tokio::spawn(supervisor.run());

        let handle = SupervisorHandle {
            commands: command_tx,
            state: state_rx,
        };
        (handle, chat_rx, task)
    }

    async fn run(mut self) {
        self.maybe_auto_connect().await;

        loop {
            if self.switch_pending {
                self.switch_pending = false;
                let channel_id = self.state.borrow().channel_id.clone();
                tracing::info!(?channel_id, "Switching EventSub channel");
                self.start_connect(None, true).await;
                continue;
            }

            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    None | Some(SupervisorCommand::Shutdown) => {
                        self.teardown().await;
                        return;
                    }
                    Some(command) => self.handle_command(command).await,
                },
                event = next_transport_event(&mut self.transport) => {
                    self.handle_transport_event(event).await;
                }
                result = next_subscription(&mut self.subscribe) => {
                    self.subscribe = None;
                    self.handle_subscription(result).await;
                }
                () = next_retry(&mut self.retry_timer) => {
                    self.retry_timer = None;
                    tracing::info!(attempt = self.retry.attempts(), "Retrying EventSub connection");
                    self.attempt().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: SupervisorCommand) {
        match command {
            SupervisorCommand::Connect { channel_id } => self.start_connect(channel_id, true).await,
            SupervisorCommand::Disconnect => self.disconnect().await,
            SupervisorCommand::Toggle => {
                if self.is_active() {
                    self.disconnect().await;
                } else {
                    self.start_connect(None, true).await;
                }
            }
            SupervisorCommand::SwitchChannel(channel_id) => {
                self.disconnect().await;
                self.state.send_modify(|s| s.channel_id = Some(channel_id));
                self.switch_pending = true;
            }
            SupervisorCommand::SetChannel(channel_id) => {
                if self.state.borrow().channel_id == channel_id {
                    return;
                }
                let active = self.is_active();
                if active {
                    self.disconnect().await;
                }
                self.state.send_modify(|s| s.channel_id = channel_id);
                self.switch_pending = active;
            }
            SupervisorCommand::SetCredentials(credentials) => {
                let cleared = credentials.is_none();
                self.credentials = credentials;
                if cleared {
                    self.disconnect().await;
                } else {
                    self.maybe_auto_connect().await;
                }
            }
            SupervisorCommand::Shutdown => {}
        }
    }

    /// A transport exists, a subscription is in flight, or a retry is scheduled.
    fn is_active(&self) -> bool {
        self.transport.is_some() || self.subscribe.is_some() || self.retry_timer.is_some()
    }

    async fn maybe_auto_connect(&mut self) {
        if self.config.auto_connect
            && self.credentials.is_some()
            && !self.is_active()
            && !self.exhausted
            && !self.switch_pending
        {
            tracing::info!("Auto-connecting EventSub");
            self.start_connect(None, false).await;
        }
    }

    async fn start_connect(&mut self, channel_id: Option<String>, user_initiated: bool) {
        if self.transport.is_some() {
            tracing::debug!("EventSub connect ignored: already connected or connecting");
            return;
        }
        if let Some(channel_id) = channel_id {
            self.state.send_modify(|s| s.channel_id = Some(channel_id));
        }
        if user_initiated {
            self.retry.reset();
            self.exhausted = false;
        }
        self.retry_timer = None;
        self.attempt().await;
    }

    /// One connection attempt: validate credentials and open a transport.
    async fn attempt(&mut self) {
        let Some(credentials) = self.credentials.clone() else {
            self.fatal("Missing required credential: access token not configured".into());
            return;
        };
        if let Err(e) = credentials.validate() {
            self.fatal(e.to_string());
            return;
        }

        let retrying = self.retry.attempts() > 0;
        let status = if retrying {
            ConnectionStatus::Reconnecting
        } else {
            ConnectionStatus::Connecting
        };
        self.state.send_modify(|s| {
            s.status = status;
            s.session_id = None;
            s.subscription_id = None;
            s.attempts = self.retry.attempts();
            if !retrying {
                s.error = None;
            }
        });

        let (handle, events) =
            EventSubTransport::spawn(Arc::clone(&self.connector), &self.config.url);
        self.transport = Some(ActiveTransport { handle, events });
    }

    async fn handle_transport_event(&mut self, event: Option<TransportEvent>) {
        let Some(event) = event else {
            self.fail("EventSub transport stopped".into()).await;
            return;
        };

        match event {
            TransportEvent::SessionEstablished {
                session_id,
                resumed,
            } => {
                if resumed {
                    tracing::info!(%session_id, "EventSub session resumed, keeping subscription");
                    self.state
                        .send_modify(|s| s.session_id = Some(session_id));
                } else {
                    self.begin_subscription(session_id);
                }
            }
            TransportEvent::ConnectionChanged { connected: true } => {}
            TransportEvent::ConnectionChanged { connected: false } => {
                self.fail("EventSub connection lost".into()).await;
            }
            TransportEvent::Notification(notification) => match notification.chat_message() {
                Some(Ok(message)) => {
                    if self.chat_tx.send(message).await.is_err() {
                        tracing::debug!("Chat receiver dropped");
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Failed to decode channel.chat.message event");
                }
                None => {
                    tracing::debug!(
                        subscription_type = %notification.subscription_type,
                        "Ignoring EventSub notification"
                    );
                }
            },
            TransportEvent::Revoked {
                subscription_type,
                status,
            } => {
                self.fail(format!("subscription {subscription_type} revoked ({status})"))
                    .await;
            }
            TransportEvent::Error(e) => self.fail(e.to_string()).await,
        }
    }

    /// Start creating the chat subscription for a fresh session. It must
    /// finish inside the window or Twitch drops the connection.
    fn begin_subscription(&mut self, session_id: String) {
        let Some(credentials) = self.credentials.clone() else {
            return;
        };
        let channel_id = self
            .state
            .borrow()
            .channel_id
            .clone()
            .unwrap_or_else(|| credentials.user_id.clone());

        self.state.send_modify(|s| {
            if s.status == ConnectionStatus::Connected {
                s.status = ConnectionStatus::Reconnecting;
            }
            s.session_id = Some(session_id.clone());
            s.subscription_id = None;
        });

        tracing::info!(%session_id, %channel_id, "Creating chat subscription");
        let api = Arc::clone(&self.api);
        let window = self.config.subscription_window;
        self.subscribe = Some(Box::pin(async move {
            tokio::time::timeout(
                window,
                api.create_chat_subscription(&credentials, &session_id, &channel_id),
            )
            .await
        }));
    }

    async fn handle_subscription(&mut self, result: SubscribeResult) {
        match result {
            Ok(Ok(subscription)) => {
                self.retry.reset();
                self.exhausted = false;
                self.state.send_modify(|s| {
                    s.status = ConnectionStatus::Connected;
                    s.error = None;
                    s.subscription_id = Some(subscription.id.clone());
                    s.attempts = 0;
                });
                tracing::info!(subscription_id = %subscription.id, "EventSub connected");

                if let Some(credentials) = self.credentials.clone() {
                    let api = Arc::clone(&self.api);
                    tokio::spawn(async move {
                        prune_stale_subscriptions(&*api, &credentials).await;
                    });
                }
            }
            Ok(Err(e)) if !e.is_retriable() => {
                self.drop_transport().await;
                self.fatal(e.to_string());
            }
            Ok(Err(e)) => self.fail(format!("chat subscription failed: {e}")).await,
            Err(_) => {
                self.fail(format!(
                    "chat subscription not created within {}s",
                    self.config.subscription_window.as_secs()
                ))
                .await;
            }
        }
    }

    /// Retriable failure: tear down the attempt and schedule the next one.
    async fn fail(&mut self, reason: String) {
        self.drop_transport().await;

        match self.retry.next_delay(&self.config.retry) {
            Some(delay) => {
                let attempts_left = self.config.retry.max_attempts - self.retry.attempts();
                tracing::warn!(
                    %reason,
                    attempt = self.retry.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    attempts_left,
                    "EventSub connection failed, will retry"
                );
                self.state.send_modify(|s| {
                    s.status = ConnectionStatus::Reconnecting;
                    s.error = Some(format!(
                        "{reason}; retrying in {} ms ({attempts_left} attempts left)",
                        delay.as_millis()
                    ));
                    s.session_id = None;
                    s.subscription_id = None;
                    s.attempts = self.retry.attempts();
                });
                self.retry_timer = Some(Box::pin(tokio::time::sleep(delay)));
            }
            None => {
                tracing::error!(
                    %reason,
                    max_attempts = self.config.retry.max_attempts,
                    "EventSub retries exhausted"
                );
                self.exhausted = true;
                self.state.send_modify(|s| {
                    s.status = ConnectionStatus::Error;
                    s.error = Some(format!(
                        "{reason}; gave up after {} attempts, reconnect manually",
                        self.config.retry.max_attempts
                    ));
                    s.session_id = None;
                    s.subscription_id = None;
                });
            }
        }
    }

    /// Non-retriable error: no timer is scheduled.
    fn fatal(&mut self, reason: String) {
        tracing::error!(%reason, "EventSub cannot connect");
        self.retry_timer = None;
        self.state.send_modify(|s| {
            s.status = ConnectionStatus::Error;
            s.error = Some(reason);
            s.session_id = None;
            s.subscription_id = None;
        });
    }

    async fn disconnect(&mut self) {
        self.retry_timer = None;
        self.drop_transport().await;
        self.state.send_modify(|s| {
            s.status = ConnectionStatus::Disconnected;
            s.error = None;
            s.session_id = None;
            s.subscription_id = None;
            s.attempts = 0;
        });
        tracing::info!("EventSub disconnected");
    }

    async fn drop_transport(&mut self) {
        self.subscribe = None;
        if let Some(ActiveTransport { mut handle, events }) = self.transport.take() {
            // Dropping the receiver first lets a task blocked on a full
            // channel observe the shutdown.
            drop(events);
            handle.disconnect().await;
        }
    }

    async fn teardown(&mut self) {
        self.switch_pending = false;
        self.disconnect().await;
        tracing::info!("EventSub supervisor stopped");
    }
}

async fn next_transport_event(transport: &mut Option<ActiveTransport>) -> Option<TransportEvent> {
    match transport {
        Some(active) => active.events.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_subscription(pending: &mut Option<PendingSubscription>) -> SubscribeResult {
    match pending {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_retry(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.await,
        None => std::future::pending().await,
    }
}

/// Delete websocket subscriptions left behind by earlier sessions.
/// Failures are logged and otherwise ignored.
pub async fn prune_stale_subscriptions<A: SubscriptionApi>(
    api: &A,
    credentials: &Credentials,
) {
    let subscriptions = match api.list_subscriptions(credentials).await {
        Ok(subscriptions) => subscriptions,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to list EventSub subscriptions");
            return;
        }
    };

    for stale in subscriptions
        .iter()
        .filter(|s| s.is_websocket() && !s.is_enabled())
    {
        match api.delete_subscription(credentials, &stale.id).await {
            Ok(()) => tracing::info!(
                subscription_id = %stale.id,
                status = %stale.status,
                "Deleted stale EventSub subscription"
            ),
            Err(TwitchError::ApiError { status: 404, .. }) => {
                tracing::debug!(subscription_id = %stale.id, "Stale subscription already gone");
            }
            Err(e) => {
                tracing::warn!(subscription_id = %stale.id, error = %e, "Failed to delete stale subscription");
            }
        }
    }
}
