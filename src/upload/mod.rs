//! Sequential multi-file upload
//!
//! Files are sent one request at a time. A failed file is logged and
//! counted, never retried, and never stops the rest of the batch.

pub mod pipeline;


use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::client::ApiError;

pub use pipeline::UploadPipeline;

/// Payload of a single transfer. Consumed by the transfer that sends it.
#[derive(Debug)]
pub struct UploadItem {
    /// Upload name: relative path for directory selections, bare name otherwise
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A file picked for upload whose bytes have not been read yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub source: PathBuf,
    pub display_name: String,
    /// `<selected dir>/<path inside it>` when the file came from a directory
    pub relative_path: Option<String>,
}

impl SelectedFile {
    /// A file selected on its own.
    pub fn flat(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let display_name = file_name_of(&source);
        Self {
            source,
            display_name,
            relative_path: None,
        }
    }

    /// Name the device stores the file under.
    pub fn upload_name(&self) -> &str {
        self.relative_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.display_name)
    }

    /// Read the bytes just before the transfer.
    pub async fn load(&self) -> Result<UploadItem, ApiError> {
        let bytes = tokio::fs::read(&self.source)
            .await
            .map_err(|source| ApiError::Io {
                path: self.source.display().to_string(),
                source,
            })?;
        Ok(UploadItem {
            name: self.upload_name().to_string(),
            bytes,
        })
    }
}

/// Running totals for one batch. `succeeded <= total` always.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadBatchResult {
    pub total: usize,
    pub succeeded: usize,
}

impl UploadBatchResult {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
        }
    }

    fn record_success(&mut self) {
        if self.succeeded < self.total {
            self.succeeded += 1;
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }
}

/// Sends one item to the device.
pub trait FileTransfer {
    async fn transfer(&self, item: UploadItem) -> Result<(), ApiError>;
}

/// Progress surface owned by the pipeline while a batch runs.
pub trait UploadView {
    fn show_progress(&mut self);
    fn set_progress(&mut self, percent: u8);
    fn set_status(&mut self, text: &str);
    fn toast(&mut self, message: &str);
    fn hide_progress(&mut self);
    /// Reload the file listing and usage statistics.
    async fn refresh(&mut self);
}

/// Expand command-line paths into upload handles.
///
/// Plain files keep their bare name. Directories are walked recursively in
/// file-name order and each file is named `<dir>/<sub/path>`. Paths that are
/// neither are skipped with a warning.
pub fn collect_selection<P: AsRef<Path>>(paths: &[P]) -> Vec<SelectedFile> {
    let mut selection = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_file() {
            selection.push(SelectedFile::flat(path));
        } else if path.is_dir() {
            collect_directory(path, &mut selection);
        } else {
            tracing::warn!("Skipping {}: not a file or directory", path.display());
        }
    }
    selection
}

fn collect_directory(dir: &Path, selection: &mut Vec<SelectedFile>) {
    let root_name = file_name_of(dir);
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(inner) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let mut relative = root_name.clone();
        for component in inner.components() {
            relative.push('/');
            relative.push_str(&component.as_os_str().to_string_lossy());
        }
        selection.push(SelectedFile {
            source: entry.path().to_path_buf(),
            display_name: entry.file_name().to_string_lossy().into_owned(),
            relative_path: Some(relative),
        });
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
