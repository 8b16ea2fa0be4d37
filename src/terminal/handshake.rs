//! WebREPL login handshake.
//!
//! Inbound text is matched against an ordered rule table until a `Grant`
//! rule fires. After that every chunk passes through untouched.

/// Sent by WebREPL when it wants the password.
pub const PASSWORD_PROMPT: &str = "Password:";

/// Sent by WebREPL after a correct password.
pub const CONNECTED_MARKER: &str = "WebREPL connected";

/// Written once the connection opens.
pub const ONLINE_BANNER: &str = "\r\n\x1b[1;32m>> SYSTEM ONLINE. CONNECTED TO SHELL.\x1b[0m\r\n";

/// Written in place of the success marker, followed by a REPL prompt.
pub const GRANTED_BANNER: &str = "\r\n\x1b[1;34m[ACCESS GRANTED]\x1b[0m\r\n>>> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AwaitingAuth,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Send the text and display nothing. The state does not change.
    Reply(String),
    /// Display the granted banner and switch to pass-through.
    Grant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRule {
    pub marker: String,
    pub action: HandshakeAction,
}

/// Ordered `marker -> action` table; the first rule whose marker occurs in a chunk wins.
#[derive(Debug, Clone, Default)]
pub struct HandshakeRules {
    rules: Vec<HandshakeRule>,
}

impl HandshakeRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// The WebREPL login: answer the prompt with `password`, then grant on connect.
    pub fn webrepl(password: &str) -> Self {
        Self::new()
            .rule(PASSWORD_PROMPT, HandshakeAction::Reply(format!("{}\n", password)))
            .rule(CONNECTED_MARKER, HandshakeAction::Grant)
    }

    pub fn rule(mut self, marker: impl Into<String>, action: HandshakeAction) -> Self {
        self.rules.push(HandshakeRule {
            marker: marker.into(),
            action,
        });
        self
    }

    pub fn matching(&self, chunk: &str) -> Option<&HandshakeAction> {
        self.rules
            .iter()
            .find(|rule| chunk.contains(rule.marker.as_str()))
            .map(|rule| &rule.action)
    }
}

/// What the bridge must do in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Display(String),
    Send(String),
}

/// State machine for one terminal session.
#[derive(Debug, Clone)]
pub struct Handshake {
    state: SessionState,
    rules: HandshakeRules,
}

impl Handshake {
    pub fn new(rules: HandshakeRules) -> Self {
        Self {
            state: SessionState::Connecting,
            rules,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The connection opened. Only the first call shows the banner.
    pub fn on_open(&mut self) -> Option<Effect> {
        if self.state != SessionState::Connecting {
            return None;
        }
        self.state = SessionState::AwaitingAuth;
        Some(Effect::Display(ONLINE_BANNER.to_string()))
    }

    /// One inbound text chunk.
    pub fn on_inbound(&mut self, chunk: &str) -> Effect {
        if self.state == SessionState::Authenticated {
            return Effect::Display(chunk.to_string());
        }
        match self.rules.matching(chunk) {
            Some(HandshakeAction::Reply(text)) => {
                tracing::debug!("Answering shell prompt");
                Effect::Send(text.clone())
            }
            Some(HandshakeAction::Grant) => {
                tracing::info!("Shell session authenticated");
                self.state = SessionState::Authenticated;
                Effect::Display(GRANTED_BANNER.to_string())
            }
            None => Effect::Display(chunk.to_string()),
        }
    }

    /// Local keystrokes: echoed and forwarded in every state.
    pub fn on_keystroke(&self, data: &str) -> [Effect; 2] {
        [
            Effect::Display(data.to_string()),
            Effect::Send(data.to_string()),
        ]
    }
}
