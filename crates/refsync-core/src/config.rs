//! On-disk TOML configuration, loaded by both the client CLI and the
//! manifest-generator CLI. CLI flags layer on top of (and override) values
//! loaded here; see `refsync-cli` and `refsync-genmanifest`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration (loaded from `refsync.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefsyncConfig {
    pub client: ClientConfig,
    pub downloader: DownloaderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Local root directory to keep in sync.
    pub root: PathBuf,
    /// URL of the published hash manifest.
    pub manifest_url: String,
    /// Base URL prefixed to each per-file URL suffix.
    pub archive_prefix: String,
    /// Name of the stored manifest file, relative to `root`.
    pub manifest_name: String,
    /// Optional skiplist file name, relative to `root`.
    pub skiplist_name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            manifest_url: String::new(),
            archive_prefix: String::new(),
            manifest_name: "manifest.hash".to_string(),
            skiplist_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Maximum parallel fetches.
    pub connection_count: usize,
    /// Per-fetch read buffer size, in bytes.
    pub buffer_length: usize,
    /// Connect + read timeout, in milliseconds.
    pub connection_timeout_ms: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            connection_count: 16,
            buffer_length: 32 * 1024,
            connection_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error.
    pub level: String,
    /// "json" or "text".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl RefsyncConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Serialize configuration back to TOML (used by `config show`-style
    /// diagnostics and by round-trip tests).
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
