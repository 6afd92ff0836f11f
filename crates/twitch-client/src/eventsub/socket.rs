//! Socket abstraction under the transport, so the state machine can run
//! against an in-memory script in tests.

use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as Msg;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::TransportError;

/// Frames the transport cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    Text(String),
    Ping(Vec<u8>),
    /// Close frame with its code, if the peer sent one.
    Close(Option<u16>),
}

pub trait Socket: Send + 'static {
    /// Next inbound frame; `None` once the stream has ended.
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<WsFrame, TransportError>>> + Send;

    fn send_pong(&mut self, data: Vec<u8>) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close with the given code. Errors are ignored; the socket is gone either way.
    fn close(&mut self, code: u16) -> impl Future<Output = ()> + Send;
}

pub trait Connector: Send + Sync + 'static {
    type Socket: Socket;

    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Socket, TransportError>> + Send;
}

/// Production connector: tokio-tungstenite over native TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

pub struct TungsteniteSocket {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connector for TungsteniteConnector {
    type Socket = TungsteniteSocket;

    async fn connect(&self, url: &str) -> Result<TungsteniteSocket, TransportError> {
        tracing::info!(ws_url = %url, "Connecting to EventSub WebSocket");
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(TungsteniteSocket { ws })
    }
}

impl Socket for TungsteniteSocket {
    async fn next_frame(&mut self) -> Option<Result<WsFrame, TransportError>> {
        loop {
            let frame = match self.ws.next().await? {
                Ok(Msg::Text(text)) => WsFrame::Text(text.as_str().to_owned()),
                Ok(Msg::Ping(data)) => WsFrame::Ping(data.to_vec()),
                Ok(Msg::Close(close)) => WsFrame::Close(close.map(|c| u16::from(c.code))),
                Ok(Msg::Pong(_) | Msg::Binary(_) | Msg::Frame(_)) => continue,
                Err(e) => return Some(Err(TransportError::Protocol(e.to_string()))),
            };
            return Some(Ok(frame));
        }
    }

    async fn send_pong(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        self.ws
            .send(Msg::Pong(data.into()))
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }

    async fn close(&mut self, code: u16) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        if let Err(e) = self.ws.close(Some(frame)).await {
            tracing::debug!(error = %e, "EventSub socket close failed");
        }
    }
}
