//! Persistent CLI configuration (`~/.devicefm/config.json`).

use crate::platform;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Device connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Device hostname or IP (the ESP32 hotspot answers on 192.168.4.1)
    pub host: String,

    /// HTTP port of the file server
    pub http_port: u16,

    /// WebREPL port
    pub shell_port: u16,

    /// HTTP Basic auth user
    pub username: String,

    /// HTTP Basic auth password
    pub password: String,

    /// Password answered to the WebREPL `Password:` prompt
    pub repl_password: String,

    /// Delay between the upload summary and the listing refresh (ms)
    pub upload_settle_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "192.168.4.1".to_string(),
            http_port: 80,
            shell_port: 8266,
            username: "admin".to_string(),
            password: "admin".to_string(),
            repl_password: "1234".to_string(),
            upload_settle_ms: 1500,
        }
    }
}

impl Config {
    /// Base URL of the HTTP API, without trailing slash.
    pub fn http_base(&self) -> String {
        if self.http_port == 80 {
            format!("http://{}", self.host)
        } else {
            format!("http://{}:{}", self.host, self.http_port)
        }
    }

    /// WebSocket URL of the WebREPL shell.
    pub fn shell_url(&self) -> String {
        format!("ws://{}:{}/", self.host, self.shell_port)
    }

    pub fn upload_settle_delay(&self) -> Duration {
        Duration::from_millis(self.upload_settle_ms)
    }
}

/// Path of the config file
pub fn config_file() -> PathBuf {
    platform::config_dir().join("config.json")
}

/// Load config from disk. `None` when missing or unreadable.
pub fn load_config() -> Option<Config> {
    let path = config_file();
    if !path.exists() {
        return None;
    }
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&data) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::warn!("Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

/// Save config to disk, creating `~/.devicefm` if needed.
pub fn save_config(cfg: &Config) -> std::io::Result<()> {
    let path = config_file();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(cfg)?;
    fs::write(path, data)
}
