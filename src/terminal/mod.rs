//! Interactive WebREPL terminal
//!
//! One display surface, one shell connection. Inbound text goes through the
//! login [`Handshake`] until access is granted, then both directions are
//! relayed as-is. Local keystrokes are echoed and forwarded in every state.

pub mod console;
pub mod handshake;
pub mod transport;

use futures_util::{Sink, SinkExt, Stream, StreamExt};

pub use handshake::{Effect, Handshake, HandshakeRules, SessionState};

#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error("shell connection failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Where shell output is rendered.
pub trait TerminalDisplay {
    /// `true` once something has been rendered on this surface.
    fn is_open(&self) -> bool;
    fn open(&mut self) -> std::io::Result<()>;
    fn write(&mut self, text: &str) -> std::io::Result<()>;
}

/// Opens the duplex text connection to the shell.
pub trait Connector {
    type Sink: Sink<String, Error = TerminalError> + Unpin;
    type Stream: Stream<Item = Result<String, TerminalError>> + Unpin;

    async fn connect(&self) -> Result<(Self::Sink, Self::Stream), TerminalError>;
}

/// A live terminal bound to one display.
pub struct TerminalSession<'d, D, S, R> {
    display: &'d mut D,
    handshake: Handshake,
    sink: S,
    stream: R,
}

/// Open `display` and connect it to the shell.
///
/// Returns `Ok(None)` without connecting when the display is already open,
/// so repeated calls never create a second session.
pub async fn init<'d, D, C>(
    display: &'d mut D,
    connector: &C,
    rules: HandshakeRules,
) -> Result<Option<TerminalSession<'d, D, C::Sink, C::Stream>>, TerminalError>
where
    D: TerminalDisplay,
    C: Connector,
{
    if display.is_open() {
        tracing::debug!("Terminal already initialized, skipping");
        return Ok(None);
    }
    display.open()?;

    let (sink, stream) = connector.connect().await.map_err(|e| {
        tracing::warn!("Shell connection failed: {}", e);
        e
    })?;

    let mut session = TerminalSession {
        display,
        handshake: Handshake::new(rules),
        sink,
        stream,
    };
    if let Some(effect) = session.handshake.on_open() {
        session.apply(effect).await?;
    }
    Ok(Some(session))
}

impl<'d, D, S, R> TerminalSession<'d, D, S, R>
where
    D: TerminalDisplay,
    S: Sink<String, Error = TerminalError> + Unpin,
    R: Stream<Item = Result<String, TerminalError>> + Unpin,
{
    pub fn state(&self) -> SessionState {
        self.handshake.state()
    }

    pub async fn handle_inbound(&mut self, chunk: &str) -> Result<(), TerminalError> {
        let effect = self.handshake.on_inbound(chunk);
        self.apply(effect).await
    }

    pub async fn handle_keystroke(&mut self, data: &str) -> Result<(), TerminalError> {
        for effect in self.handshake.on_keystroke(data) {
            self.apply(effect).await?;
        }
        Ok(())
    }

    async fn apply(&mut self, effect: Effect) -> Result<(), TerminalError> {
        match effect {
            Effect::Display(text) => self.display.write(&text)?,
            Effect::Send(text) => self.sink.send(text).await?,
        }
        Ok(())
    }

    /// Relay until the shell closes the connection or `keystrokes` ends.
    pub async fn run<K>(mut self, keystrokes: K) -> Result<(), TerminalError>
    where
        K: Stream<Item = String>,
    {
        let mut keystrokes = std::pin::pin!(keystrokes);
        loop {
            tokio::select! {
                inbound = self.stream.next() => match inbound {
                    Some(Ok(chunk)) => self.handle_inbound(&chunk).await?,
                    Some(Err(e)) => {
                        tracing::warn!("Shell connection error: {}", e);
                        return Err(e);
                    }
                    None => {
                        tracing::info!("Shell connection closed ({:?})", self.state());
                        return Ok(());
                    }
                },
                key = keystrokes.next() => match key {
                    Some(data) => self.handle_keystroke(&data).await?,
                    None => {
                        tracing::info!("Detached from shell");
                        if let Err(e) = self.sink.close().await {
                            tracing::debug!("Closing shell connection: {}", e);
                        }
                        return Ok(());
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::handshake::{GRANTED_BANNER, ONLINE_BANNER};
    use super::*;
    use futures_util::stream;
    use std::pin::Pin;
    use futures_util::stream::BoxStream;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};

    #[derive(Default)]
    struct MemoryDisplay {
        opened: bool,
        output: String,
    }

    impl TerminalDisplay for MemoryDisplay {
        fn is_open(&self) -> bool {
            self.opened
        }
        fn open(&mut self) -> std::io::Result<()> {
            self.opened = true;
            Ok(())
        }
        fn write(&mut self, text: &str) -> std::io::Result<()> {
            self.output.push_str(text);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl Sink<String> for RecordingSink {
        type Error = TerminalError;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
            self.sent.lock().unwrap().push(item);
            Ok(())
        }
        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            self.closed.store(true, Ordering::SeqCst);
            Poll::Ready(Ok(()))
        }
    }

    struct ScriptedConnector {
        inbound: Mutex<Vec<Result<String, TerminalError>>>,
        sink: RecordingSink,
        connects: AtomicUsize,
        hold_open: bool,
    }

    impl ScriptedConnector {
        fn new(chunks: &[&str]) -> Self {
            Self {
                inbound: Mutex::new(chunks.iter().map(|c| Ok(c.to_string())).collect()),
                sink: RecordingSink::default(),
                connects: AtomicUsize::new(0),
                hold_open: false,
            }
        }

        /// Inbound never ends after the scripted chunks.
        fn held_open(chunks: &[&str]) -> Self {
            Self {
                hold_open: true,
                ..Self::new(chunks)
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sink.sent.lock().unwrap().clone()
        }
    }

    impl Connector for ScriptedConnector {
        type Sink = RecordingSink;
        type Stream = BoxStream<'static, Result<String, TerminalError>>;

        async fn connect(&self) -> Result<(Self::Sink, Self::Stream), TerminalError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let chunks = stream::iter(std::mem::take(&mut *self.inbound.lock().unwrap()));
            let inbound = if self.hold_open {
                chunks.chain(stream::pending()).boxed()
            } else {
                chunks.boxed()
            };
            Ok((self.sink.clone(), inbound))
        }
    }

    fn rules() -> HandshakeRules {
        HandshakeRules::webrepl("1234")
    }

    #[tokio::test]
    async fn login_transcript_is_hidden() {
        let connector =
            ScriptedConnector::new(&["boot log line", "Password:", "WebREPL connected"]);
        let mut display = MemoryDisplay::default();

        let session = init(&mut display, &connector, rules()).await.unwrap().unwrap();
        session.run(stream::pending()).await.unwrap();

        assert_eq!(
            display.output,
            format!("{}boot log line{}", ONLINE_BANNER, GRANTED_BANNER)
        );
        assert!(!display.output.contains("Password:"));
        assert!(!display.output.contains("WebREPL connected"));
        assert_eq!(connector.sent(), vec!["1234\n".to_string()]);
    }

    #[tokio::test]
    async fn granted_banner_shown_once_then_passthrough() {
        let connector = ScriptedConnector::new(&[
            "Password:",
            "WebREPL connected",
            ">>> ",
            "Password:",
            "WebREPL connected",
        ]);
        let mut display = MemoryDisplay::default();

        let session = init(&mut display, &connector, rules()).await.unwrap().unwrap();
        session.run(stream::pending()).await.unwrap();

        assert_eq!(display.output.matches("[ACCESS GRANTED]").count(), 1);
        assert!(display.output.ends_with(">>> Password:WebREPL connected"));
        assert_eq!(connector.sent(), vec!["1234\n".to_string()]);
    }

    #[tokio::test]
    async fn second_init_on_open_display_does_not_connect() {
        let connector = ScriptedConnector::new(&[]);
        let mut display = MemoryDisplay::default();

        let first = init(&mut display, &connector, rules()).await.unwrap();
        assert!(first.is_some());
        drop(first);
        let second = init(&mut display, &connector, rules()).await.unwrap();

        assert!(second.is_none());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(display.output, ONLINE_BANNER);
    }

    #[tokio::test]
    async fn keystrokes_are_echoed_and_forwarded_before_auth() {
        let connector = ScriptedConnector::new(&[]);
        let mut display = MemoryDisplay::default();

        let mut session = init(&mut display, &connector, rules()).await.unwrap().unwrap();
        session.handle_keystroke("help()\r").await.unwrap();
        assert_eq!(session.state(), SessionState::AwaitingAuth);
        drop(session);

        assert!(display.output.ends_with("help()\r"));
        assert_eq!(connector.sent(), vec!["help()\r".to_string()]);
    }

    #[tokio::test]
    async fn detach_closes_the_connection() {
        let connector = ScriptedConnector::held_open(&["Password:"]);
        let mut display = MemoryDisplay::default();
        let session = init(&mut display, &connector, rules()).await.unwrap().unwrap();

        session
            .run(stream::iter(vec!["a".to_string()]))
            .await
            .unwrap();

        assert!(connector.sent().contains(&"a".to_string()));
        assert!(connector.sink.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn transport_error_ends_session_with_error() {
        let connector = ScriptedConnector::new(&[]);
        *connector.inbound.lock().unwrap() = vec![
            Ok("Password:".to_string()),
            Err(TerminalError::Io(std::io::Error::other("reset"))),
        ];
        let mut display = MemoryDisplay::default();
        let session = init(&mut display, &connector, rules()).await.unwrap().unwrap();

        let result = session.run(stream::pending()).await;

        assert!(matches!(result, Err(TerminalError::Io(_))));
        assert_eq!(connector.sent(), vec!["1234\n".to_string()]);
    }
}
