//! The local TTY as a terminal display and keystroke source.

use std::future;
use std::io::{Read, Write};

use futures_util::{stream, Stream};
use tokio::sync::mpsc;

use super::TerminalDisplay;
use crate::platform::RawModeGuard;

/// Ctrl+] leaves the session; Ctrl+C is forwarded to the device in raw mode.
pub const DETACH_KEY: u8 = 0x1d;

/// Renders shell output on stdout with the TTY in raw mode.
pub struct ConsoleDisplay {
    raw_mode: Option<RawModeGuard>,
    opened: bool,
    last_char: Option<char>,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self {
            raw_mode: None,
            opened: false,
            last_char: None,
        }
    }

    pub fn is_raw(&self) -> bool {
        self.raw_mode.is_some()
    }
}

impl Default for ConsoleDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalDisplay for ConsoleDisplay {
    fn is_open(&self) -> bool {
        self.opened
    }

    fn open(&mut self) -> std::io::Result<()> {
        self.raw_mode = RawModeGuard::enable().map_err(std::io::Error::from)?;
        self.opened = true;
        Ok(())
    }

    fn write(&mut self, text: &str) -> std::io::Result<()> {
        let converted = convert_eol(text, self.last_char);
        if let Some(ch) = text.chars().last() {
            self.last_char = Some(ch);
        }
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(converted.as_bytes())?;
        stdout.flush()
    }
}

/// Expand bare `\n` to `\r\n` so raw-mode output starts each line at column 0.
fn convert_eol(text: &str, mut prev: Option<char>) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if ch == '\n' && prev != Some('\r') {
            out.push('\r');
        }
        out.push(ch);
        prev = Some(ch);
    }
    out
}

enum Input {
    Typed(String),
    Detach,
}

/// Chunks typed on stdin, ending when the detach key is pressed.
///
/// End of input (a drained pipe) does not end the stream, so the session
/// keeps relaying shell output until the device closes the connection.
pub fn stdin_keystrokes() -> impl Stream<Item = String> {
    keystrokes_from(std::io::stdin())
}

/// Keystrokes read from `reader` on a detached OS thread.
///
/// A pending read on that thread never holds up runtime shutdown, unlike
/// `tokio::io::stdin`, whose blocking read cannot be cancelled.
pub fn keystrokes_from<R>(reader: R) -> impl Stream<Item = String>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || pump_input(reader, tx));
    stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Some(Input::Typed(text)) => Some((text, rx)),
            Some(Input::Detach) => None,
            None => future::pending().await,
        }
    })
}

fn pump_input<R: Read>(mut reader: R, tx: mpsc::UnboundedSender<Input>) {
    let mut buf = [0u8; 1024];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => {
                tracing::debug!("stdin closed; waiting for shell output only");
                return;
            }
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("Failed to read stdin: {}", e);
                return;
            }
        };
        let (typed, detach) = split_detach(&buf[..n]);
        if !typed.is_empty() {
            let text = String::from_utf8_lossy(typed).into_owned();
            if tx.send(Input::Typed(text)).is_err() {
                return;
            }
        }
        if detach {
            if tx.send(Input::Detach).is_err() {
                tracing::debug!("Session already ended before detach");
            }
            return;
        }
    }
}

/// Bytes typed before the detach key, and whether it was pressed.
fn split_detach(bytes: &[u8]) -> (&[u8], bool) {
    match bytes.iter().position(|&b| b == DETACH_KEY) {
        Some(pos) => (&bytes[..pos], true),
        None => (bytes, false),
    }
}
