//! Platform helpers shared by config and the terminal bridge.

use std::path::PathBuf;

/// Home directory, falling back to the current directory.
pub fn home_dir() -> Option<PathBuf> {
    dirs_next::home_dir().or_else(|| std::env::current_dir().ok())
}

/// Directory holding `config.json` (`~/.devicefm`).
pub fn config_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".devicefm")
}

/// Puts the controlling TTY into raw mode and restores it on drop.
#[cfg(unix)]
pub struct RawModeGuard {
    original: nix::sys::termios::Termios,
}

#[cfg(unix)]
impl RawModeGuard {
    /// Returns `Ok(None)` when stdin is not a terminal (pipes, tests).
    pub fn enable() -> nix::Result<Option<Self>> {
        use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg};
        use std::io::IsTerminal;
        use std::os::fd::AsFd;

        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return Ok(None);
        }
        let original = tcgetattr(stdin.as_fd())?;
        let mut raw = original.clone();
        cfmakeraw(&mut raw);
        tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &raw)?;
        Ok(Some(Self { original }))
    }
}

#[cfg(unix)]
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        use nix::sys::termios::{tcsetattr, SetArg};
        use std::os::fd::AsFd;

        let stdin = std::io::stdin();
        if let Err(e) = tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &self.original) {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Line-buffered fallback: nothing to toggle.
#[cfg(not(unix))]
pub struct RawModeGuard;

#[cfg(not(unix))]
impl RawModeGuard {
    pub fn enable() -> std::io::Result<Option<Self>> {
        Ok(None)
    }
}
