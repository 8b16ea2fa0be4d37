use std::time::Duration;

use super::{FileTransfer, SelectedFile, UploadBatchResult, UploadView};

/// Delay between the summary toast and hiding the progress UI.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1500);

/// Drives one batch at a time through a [`FileTransfer`], reporting to an [`UploadView`].
pub struct UploadPipeline<T, V> {
    transfer: T,
    view: V,
    settle_delay: Duration,
}

impl<T: FileTransfer, V: UploadView> UploadPipeline<T, V> {
    pub fn new(transfer: T, view: V) -> Self {
        Self {
            transfer,
            view,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Upload `files` in order, one request in flight at most.
    pub async fn run(&mut self, files: Vec<SelectedFile>) -> UploadBatchResult {
        if files.is_empty() {
            return UploadBatchResult::default();
        }

        let total = files.len();
        let mut result = UploadBatchResult::new(total);
        self.view.show_progress();

        for (index, file) in files.into_iter().enumerate() {
            self.view
                .set_status(&format!("Uploading {}...", file.display_name));
            self.view.set_progress(progress_percent(index, total));

            let outcome = match file.load().await {
                Ok(item) => self.transfer.transfer(item).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => result.record_success(),
                Err(e) => tracing::warn!("Upload of {} failed: {}", file.upload_name(), e),
            }
        }

        self.view.set_progress(100);
        self.view
            .toast(&format!("Uploaded {} files", result.succeeded));
        tracing::info!(
            "Upload batch finished: {}/{} succeeded",
            result.succeeded,
            result.total
        );

        tokio::time::sleep(self.settle_delay).await;
        self.view.hide_progress();
        self.view.set_progress(0);
        self.view.refresh().await;

        result
    }
}

/// `floor(index / total * 100)`
pub fn progress_percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (index.min(total) * 100 / total) as u8
}
