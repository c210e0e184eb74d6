use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_SOCKET_URL, RECONNECT_INITIAL_DELAY_MS, RECONNECT_MAX_DELAY_MS,
    RECONNECT_NOTIFY_AFTER_ATTEMPTS, REQUEST_TIMEOUT_SECS, THREAD_CREATED_UNSEEN_SEED,
};
use crate::error::ConfigError;

/// Engine configuration, loadable from a camelCase JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    /// Real-time channel endpoint (ws:// or wss://)
    pub socket_url: String,
    /// Base URL of the REST collaborators
    pub api_base_url: String,
    /// Unseen count given to threads announced by `chatStarted`
    pub thread_created_unseen_seed: u32,
    /// Agent's personal sound preference for new-message notifications
    pub sound_enabled: bool,
    pub request_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Consecutive failed attempts before the agent is told about it
    pub notify_after_attempts: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            thread_created_unseen_seed: THREAD_CREATED_UNSEEN_SEED,
            sound_enabled: true,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: RECONNECT_INITIAL_DELAY_MS,
            max_delay_ms: RECONNECT_MAX_DELAY_MS,
            notify_after_attempts: RECONNECT_NOTIFY_AFTER_ATTEMPTS,
        }
    }
}

impl CoreConfig {
    /// Default config file location: `<config_dir>/helpdesk/config.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("helpdesk")
            .join("config.json")
    }

    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Load the default file if it exists, otherwise fall back to defaults.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply `HELPDESK_SOCKET_URL` / `HELPDESK_API_URL` overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("HELPDESK_SOCKET_URL") {
            self.socket_url = url;
        }
        if let Ok(url) = std::env::var("HELPDESK_API_URL") {
            self.api_base_url = url;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
