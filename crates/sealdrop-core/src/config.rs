use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ShareError, ShareResult};

/// Default chunk size for file uploads (5 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Top-level client configuration (loaded from sealdrop.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealdropConfig {
    pub server: ServerEndpointConfig,
    pub upload: UploadConfig,
    pub finalize: FinalizeConfig,
    pub logging: LoggingConfig,
}

impl SealdropConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> ShareResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ShareError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ShareResult<()> {
        if self.upload.chunk_size_bytes == 0 {
            return Err(ShareError::Config(
                "upload.chunk_size_bytes must be greater than zero".into(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ShareError::Config(
                "server.request_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.finalize.max_attempts == 0 {
            return Err(ShareError::Config(
                "finalize.max_attempts must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEndpointConfig {
    /// Backend base URL (default: http://localhost:8080)
    pub base_url: String,
    /// Origin + path used to build share links (default: base_url + "/")
    pub share_base: Option<String>,
    /// Refuse plaintext HTTP endpoints
    pub enforce_tls: bool,
    /// Per-request timeout in seconds (default: 60)
    pub request_timeout_secs: u64,
}

impl ServerEndpointConfig {
    pub fn share_base(&self) -> String {
        match &self.share_base {
            Some(base) => base.clone(),
            None => format!("{}/", self.base_url.trim_end_matches('/')),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Fixed chunk size in bytes; the last chunk may be shorter
    pub chunk_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizeConfig {
    /// Delay before each merge status check, in milliseconds (default: 3000)
    pub poll_interval_ms: u64,
    /// Status checks before giving up (default: 20)
    pub max_attempts: u32,
}

impl FinalizeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for ServerEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            share_base: None,
            enforce_tls: false,
            request_timeout_secs: 60,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            max_attempts: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
