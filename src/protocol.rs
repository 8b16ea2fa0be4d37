//! Device file API payloads
//!
//! Mirrors the JSON bodies served by the device's `/api/*` endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of `GET /api/files`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: FileKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Hosted website folder
    Dir,
    /// Script or other plain file
    File,
}

impl FileEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }
}

/// Filesystem usage from `GET /api/stats`, in KB
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Body of `POST /api/save`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub filename: String,
    pub code: String,
}

/// Target of `POST /api/stop`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopTarget {
    All,
    File(String),
}

impl StopTarget {
    /// Value of the `target` query parameter.
    pub fn as_query(&self) -> &str {
        match self {
            StopTarget::All => "ALL",
            StopTarget::File(name) => name,
        }
    }
}

impl From<Option<String>> for StopTarget {
    fn from(name: Option<String>) -> Self {
        match name {
            Some(name) if name != "ALL" => StopTarget::File(name),
            _ => StopTarget::All,
        }
    }
}

impl fmt::Display for StopTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}
