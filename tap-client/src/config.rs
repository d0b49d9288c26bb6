//! Client configuration and token persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tap_core::auth::TokenStore;
use tap_core::protocol::ConnectOptions;

/// Top-level configuration for the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server location.
    pub server: ServerConfig,
    /// Stream tuning.
    pub stream: StreamConfig,
    /// Input behavior.
    pub input: InputConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Server location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server base URL, `http://host:port` or `https://host:port`.
    pub url: String,
    /// Where the auth token is persisted between runs.
    pub token_file: PathBuf,
}

/// Stream tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Target frames per second.
    pub fps: u8,
    /// JPEG quality (1-100).
    pub quality: u8,
    /// Cap on frame width in pixels; 0 = native.
    pub max_width: u32,
    /// Monitor to stream (0 = combined desktop).
    pub monitor: u8,
}

/// Input behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// "touchpad" (relative) or "direct" (absolute) pointer mapping.
    pub mode: String,
    /// Server-side pointer sensitivity multiplier.
    pub sensitivity: f64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            stream: StreamConfig::default(),
            input: InputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8443".into(),
            token_file: PathBuf::from("tap-token"),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fps: 15,
            quality: 60,
            max_width: 0,
            monitor: 0,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mode: "touchpad".into(),
            sensitivity: 1.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// HTTP base URL, no trailing slash.
    pub fn http_base(&self) -> String {
        self.server.url.trim_end_matches('/').to_string()
    }

    /// WebSocket base URL derived from the HTTP one.
    pub fn ws_base(&self) -> String {
        let base = self.http_base();
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base
        }
    }

    /// Channel connection options from the configured stream tuning.
    pub fn connect_options(&self, token: Option<String>) -> ConnectOptions {
        ConnectOptions {
            base_url: self.ws_base(),
            token,
            max_width: (self.stream.max_width > 0).then_some(self.stream.max_width),
            fps: self.stream.fps,
            quality: self.stream.quality,
        }
    }
}

// ── TokenFile ────────────────────────────────────────────────────

/// Token persistence in a plain file. I/O failures are logged and
/// treated as "no token".
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for TokenFile {
    fn load(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Err(_) => None,
        }
    }

    fn store(&self, token: &str) {
        if let Err(e) = std::fs::write(&self.path, token) {
            tracing::warn!("failed to persist token to {}: {e}", self.path.display());
        }
    }

    fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove token file: {e}");
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips() {
        let cfg = ClientConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.stream.fps, 15);
        assert_eq!(parsed.server.url, "http://127.0.0.1:8443");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: ClientConfig = toml::from_str(
            r#"
            [server]
            url = "https://desk.lan:8443"

            [stream]
            quality = 85
            "#,
        )
        .unwrap();
        assert_eq!(parsed.server.url, "https://desk.lan:8443");
        assert_eq!(parsed.stream.quality, 85);
        assert_eq!(parsed.stream.fps, 15);
        assert_eq!(parsed.input.mode, "touchpad");
    }

    #[test]
    fn ws_base_follows_http_scheme() {
        let mut cfg = ClientConfig::default();
        assert_eq!(cfg.ws_base(), "ws://127.0.0.1:8443");

        cfg.server.url = "https://desk.lan:8443/".into();
        assert_eq!(cfg.ws_base(), "wss://desk.lan:8443");
    }

    #[test]
    fn connect_options_omit_zero_max_width() {
        let mut cfg = ClientConfig::default();
        let opts = cfg.connect_options(Some("tok".into()));
        assert_eq!(opts.max_width, None);
        assert_eq!(opts.token.as_deref(), Some("tok"));

        cfg.stream.max_width = 1280;
        assert_eq!(cfg.connect_options(None).max_width, Some(1280));
    }

    #[test]
    fn token_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenFile::new(dir.path().join("token"));

        assert_eq!(store.load(), None);
        store.store("abc.def");
        assert_eq!(store.load(), Some("abc.def".to_string()));
        store.clear();
        assert_eq!(store.load(), None);
        store.clear(); // idempotent
    }
}
