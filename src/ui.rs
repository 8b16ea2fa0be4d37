//! Console rendering: toasts, progress line, file listing and usage stats.

use std::io::Write;

use colored::Colorize;

use crate::client::DeviceClient;
use crate::protocol::{FileEntry, Stats};
use crate::upload::UploadView;

const BAR_WIDTH: usize = 30;

/// Short status message on stderr.
pub fn toast(message: &str) {
    eprintln!("{} {}", "»".cyan(), message);
}

/// `N B`, `X.X KB` above 1024 bytes, `Folder` for directories.
pub fn format_size(entry: &FileEntry) -> String {
    if entry.is_dir() {
        return "Folder".to_string();
    }
    if entry.size > 1024 {
        format!("{:.1} KB", entry.size as f64 / 1024.0)
    } else {
        format!("{} B", entry.size)
    }
}

/// Split a listing into (apps, websites).
pub fn partition(entries: &[FileEntry]) -> (Vec<&FileEntry>, Vec<&FileEntry>) {
    entries.iter().partition(|e| !e.is_dir())
}

/// Render the listing the way the device dashboard groups it.
pub fn render_listing(entries: &[FileEntry], base_url: &str) -> String {
    let (apps, sites) = partition(entries);
    let mut out = String::new();

    out.push_str(&format!("{}\n", "Apps".bold()));
    if apps.is_empty() {
        out.push_str(&format!("  {}\n", "No apps installed".dimmed()));
    }
    for app in &apps {
        out.push_str(&format!(
            "  📄 {:<32} {}\n",
            app.name,
            format_size(app).dimmed()
        ));
    }

    out.push_str(&format!("{}\n", "Websites".bold()));
    if sites.is_empty() {
        out.push_str(&format!("  {}\n", "No websites".dimmed()));
    }
    for site in &sites {
        out.push_str(&format!(
            "  📂 {:<32} {}\n",
            site.name.replace('/', ""),
            site_url(base_url, &site.name).green()
        ));
    }
    out
}

/// `http://host/<name>/`: the device redirects folder URLs without a trailing slash.
pub fn site_url(base_url: &str, name: &str) -> String {
    let name = name.trim_matches('/');
    format!("{}/{}/", base_url.trim_end_matches('/'), name)
}

pub fn render_stats(stats: &Stats) -> String {
    format!(
        "{} {} KB   {} {} KB   {} {} KB",
        "Total".bold(),
        stats.total,
        "Used".bold(),
        stats.used,
        "Free".bold(),
        stats.free
    )
}

/// Fetch and print the listing. Failures are logged and leave the screen as is.
pub async fn refresh_listing(client: &DeviceClient) {
    match client.list_files().await {
        Ok(files) => print!("{}", render_listing(&files, client.base_url())),
        Err(e) => tracing::error!("Listing error: {}", e),
    }
}

/// Fetch and print usage stats. Failures are logged and leave the screen as is.
pub async fn refresh_stats(client: &DeviceClient) {
    match client.stats().await {
        Ok(stats) => println!("{}", render_stats(&stats)),
        Err(e) => tracing::error!("Stats error: {}", e),
    }
}

/// Progress bar and status on a single redrawn stderr line.
pub struct ConsoleDashboard {
    client: DeviceClient,
    visible: bool,
    percent: u8,
    status: String,
}

impl ConsoleDashboard {
    pub fn new(client: DeviceClient) -> Self {
        Self {
            client,
            visible: false,
            percent: 0,
            status: String::new(),
        }
    }

    fn redraw(&self) {
        if !self.visible {
            return;
        }
        let line = progress_line(self.percent, &self.status);
        if let Err(e) = overwrite_line(&mut std::io::stderr().lock(), &line) {
            tracing::debug!("Failed to draw progress: {}", e);
        }
    }

    fn clear_line(&self) {
        if let Err(e) = overwrite_line(&mut std::io::stderr().lock(), "") {
            tracing::debug!("Failed to clear progress: {}", e);
        }
    }
}

/// Erase the current terminal line and write `line` in its place.
fn overwrite_line(out: &mut impl Write, line: &str) -> std::io::Result<()> {
    write!(out, "\r\x1b[2K{}", line)?;
    out.flush()
}

fn progress_line(percent: u8, status: &str) -> String {
    let filled = BAR_WIDTH * usize::from(percent.min(100)) / 100;
    format!(
        "[{}{}] {:>3}% {}",
        "#".repeat(filled).green(),
        "-".repeat(BAR_WIDTH - filled).dimmed(),
        percent,
        status
    )
}

impl UploadView for ConsoleDashboard {
    fn show_progress(&mut self) {
        self.visible = true;
        self.redraw();
    }

    fn set_progress(&mut self, percent: u8) {
        self.percent = percent;
        self.redraw();
    }

    fn set_status(&mut self, text: &str) {
        self.status = text.to_string();
        self.redraw();
    }

    fn toast(&mut self, message: &str) {
        if self.visible {
            eprintln!();
        }
        toast(message);
    }

    fn hide_progress(&mut self) {
        if self.visible {
            self.clear_line();
        }
        self.visible = false;
    }

    async fn refresh(&mut self) {
        refresh_listing(&self.client).await;
        refresh_stats(&self.client).await;
    }
}
