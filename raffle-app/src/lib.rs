//! Live raffle application: configuration, raffle state, chat ingestion and
//! the control HTTP/WebSocket server.

pub mod app;
pub mod background;
pub mod bootstrap;
pub mod chat_ingest;
pub mod config;
pub mod events;
pub mod raffle_store;
pub mod server;
pub mod services;
pub mod shutdown;

