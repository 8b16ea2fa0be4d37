//! Editing remote files.
//!
//! An [`EditSession`] is the edit target: it is passed to `save` explicitly,
//! so nothing global tracks which file is open.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::client::{ApiError, DeviceClient};
use crate::protocol::SaveRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    file: String,
    original: String,
}

impl EditSession {
    pub fn new(file: impl Into<String>, original: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            original: original.into(),
        }
    }

    /// Fetch `file` and start editing it.
    pub async fn open(client: &DeviceClient, file: &str) -> Result<Self, ApiError> {
        let original = client.read_file(file).await?;
        Ok(Self::new(file, original))
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn is_modified(&self, code: &str) -> bool {
        self.original != code
    }

    pub fn save_request(&self, code: &str) -> SaveRequest {
        SaveRequest {
            filename: self.file.clone(),
            code: code.to_string(),
        }
    }

    /// Write `code` back to this session's file.
    pub async fn save(&self, client: &DeviceClient, code: &str) -> Result<(), ApiError> {
        client.save_file(&self.save_request(code)).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("no editor found; set $VISUAL or $EDITOR")]
    NotFound,

    #[error("editor exited with {0}")]
    Failed(std::process::ExitStatus),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// `$VISUAL`, then `$EDITOR`, then `vi` from `PATH`.
pub fn resolve_editor() -> Result<PathBuf, EditorError> {
    let candidates = ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .filter(|v| !v.trim().is_empty())
        .chain(std::iter::once("vi".to_string()));

    for candidate in candidates {
        if let Ok(path) = which::which(candidate.trim()) {
            return Ok(path);
        }
        tracing::debug!("Editor {} not found on PATH", candidate);
    }
    Err(EditorError::NotFound)
}

/// Let the user edit `text` in their editor and return the result.
///
/// The temp file keeps the remote extension so editors pick the right syntax.
pub fn edit_text(file_name: &str, text: &str) -> Result<String, EditorError> {
    let suffix = Path::new(file_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let temp = tempfile::Builder::new()
        .prefix("devicefm-")
        .suffix(&suffix)
        .tempfile()?;
    std::fs::write(temp.path(), text)?;

    let editor = resolve_editor()?;
    tracing::debug!("Launching {} for {}", editor.display(), file_name);
    let status = Command::new(&editor).arg(temp.path()).status()?;
    if !status.success() {
        return Err(EditorError::Failed(status));
    }
    Ok(std::fs::read_to_string(temp.path())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_request_targets_session_file() {
        let session = EditSession::new("main.py", "print(1)");
        let request = session.save_request("print(2)");
        assert_eq!(request.filename, "main.py");
        assert_eq!(request.code, "print(2)");
    }

    #[test]
    fn independent_sessions_do_not_share_targets() {
        let a = EditSession::new("a.py", "");
        let b = EditSession::new("b.py", "");
        assert_eq!(a.save_request("x").filename, "a.py");
        assert_eq!(b.save_request("y").filename, "b.py");
    }

    #[test]
    fn unchanged_text_is_not_modified() {
        let session = EditSession::new("boot.py", "import gc\n");
        assert!(!session.is_modified("import gc\n"));
        assert!(session.is_modified("import gc\ngc.collect()\n"));
    }
}
