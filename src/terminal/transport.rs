//! WebSocket transport to the device's WebREPL.

use std::future;
use std::pin::Pin;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use super::{Connector, TerminalError};

pub type ShellSink = Pin<Box<dyn Sink<String, Error = TerminalError> + Send>>;
pub type ShellStream = Pin<Box<dyn Stream<Item = Result<String, TerminalError>> + Send>>;

/// Connects to `ws://<host>:<port>/`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Connector for WebSocketConnector {
    type Sink = ShellSink;
    type Stream = ShellStream;

    async fn connect(&self) -> Result<(ShellSink, ShellStream), TerminalError> {
        tracing::info!("Connecting to shell at {}", self.url);
        let (ws, _response) = connect_async(self.url.as_str()).await?;
        let (tx, rx) = ws.split();

        let tx = tx
            .with(|text: String| future::ready(Ok::<_, tungstenite::Error>(Message::Text(text))))
            .sink_map_err(TerminalError::from);
        let rx = rx.filter_map(|msg| future::ready(inbound_text(msg)));

        Ok((Box::pin(tx), Box::pin(rx)))
    }
}

/// Only text frames reach the handshake; everything else is dropped.
fn inbound_text(
    msg: Result<Message, tungstenite::Error>,
) -> Option<Result<String, TerminalError>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(text)),
        Ok(Message::Close(frame)) => {
            tracing::debug!("Shell sent close frame: {:?}", frame);
            None
        }
        Ok(other) => {
            tracing::debug!("Ignoring non-text shell frame ({} bytes)", other.len());
            None
        }
        Err(e) => Some(Err(e.into())),
    }
}
