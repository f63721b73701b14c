//! Konfiguration
//!
//! Reihenfolge beim Laden:
//! 1. Eingebaute Defaults
//! 2. TOML-Datei (`SEND_VIDEO_CONFIG` oder `config.toml` im App-Konfigurationsverzeichnis)
//! 3. Umgebungsvariablen (`SEND_VIDEO_*`)

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Öffentlicher STUN-Server, ohne Credentials
pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

/// Port des Signaling-Servers
pub const DEFAULT_SIGNALING_PORT: u16 = 8829;

/// Wartezeit zwischen zwei Verbindungsversuchen
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Kantenlänge des Videos (416×416)
pub const DEFAULT_VIDEO_SIZE: u16 = 416;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid signaling URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

// ============================================================================
// CONFIG STRUCTS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub signaling: SignalingConfig,
    pub ice: IceConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    pub host: String,
    pub port: u16,
    /// `wss://` statt `ws://`
    pub secure: bool,
    pub retry_delay_ms: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_SIGNALING_PORT,
            secure: false,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IceConfig {
    pub stun_url: String,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            stun_url: DEFAULT_STUN_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// IVF-Datei (VP8/VP9) die als Kamera dient
    pub video_file: PathBuf,
    pub width: u16,
    pub height: u16,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            video_file: PathBuf::from("video.ivf"),
            width: DEFAULT_VIDEO_SIZE,
            height: DEFAULT_VIDEO_SIZE,
        }
    }
}

// ============================================================================
// LOADING
// ============================================================================

impl Config {
    /// Lädt die Konfiguration aus Datei und Umgebung
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os("SEND_VIDEO_CONFIG")
            .map(PathBuf::from)
            .or_else(Self::default_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {:?}", path);
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parst eine TOML-Datei
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Überschreibt Werte aus `SEND_VIDEO_*` Variablen
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SEND_VIDEO_HOST") {
            self.signaling.host = host;
        }
        if let Some(port) = lookup("SEND_VIDEO_PORT") {
            self.signaling.port = parse_value("SEND_VIDEO_PORT", port)?;
        }
        if let Some(delay) = lookup("SEND_VIDEO_RETRY_MS") {
            self.signaling.retry_delay_ms = parse_value("SEND_VIDEO_RETRY_MS", delay)?;
        }
        if let Some(stun) = lookup("SEND_VIDEO_STUN_URL") {
            self.ice.stun_url = stun;
        }
        if let Some(file) = lookup("SEND_VIDEO_FILE") {
            self.media.video_file = PathBuf::from(file);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signaling.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "signaling.host",
                value: self.signaling.host.clone(),
            });
        }
        if !self.ice.stun_url.starts_with("stun:") && !self.ice.stun_url.starts_with("turn:") {
            return Err(ConfigError::InvalidValue {
                key: "ice.stun_url",
                value: self.ice.stun_url.clone(),
            });
        }
        if self.media.width == 0 || self.media.height == 0 {
            return Err(ConfigError::InvalidValue {
                key: "media.width/height",
                value: format!("{}x{}", self.media.width, self.media.height),
            });
        }
        self.signaling_url()?;
        Ok(())
    }

    /// `ws://{host}:{port}` des Signaling-Servers
    pub fn signaling_url(&self) -> Result<Url, ConfigError> {
        let scheme = if self.signaling.secure { "wss" } else { "ws" };
        let url = Url::parse(&format!(
            "{}://{}:{}",
            scheme, self.signaling.host, self.signaling.port
        ))?;
        Ok(url)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.signaling.retry_delay_ms)
    }

    /// Ermittelt den Pfad zur Konfigurationsdatei
    /// - Linux: `~/.config/send-video/config.toml`
    fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bam", "send-video")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.signaling.port, 8829);
        assert_eq!(config.retry_delay(), Duration::from_millis(500));
        assert_eq!(config.ice.stun_url, "stun:stun.l.google.com:19302");
        assert_eq!((config.media.width, config.media.height), (416, 416));
        assert_eq!(
            config.signaling_url().unwrap().as_str(),
            "ws://127.0.0.1:8829/"
        );
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [signaling]
            host = "10.0.0.7"
            secure = true

            [media]
            video_file = "/tmp/cam.ivf"
            "#,
        )
        .unwrap();

        assert_eq!(config.signaling.host, "10.0.0.7");
        assert_eq!(config.signaling.port, 8829);
        assert_eq!(config.media.video_file, PathBuf::from("/tmp/cam.ivf"));
        assert_eq!(config.media.width, 416);
        assert_eq!(
            config.signaling_url().unwrap().as_str(),
            "wss://10.0.0.7:8829/"
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SEND_VIDEO_HOST", "rover.local"),
            ("SEND_VIDEO_PORT", "9000"),
            ("SEND_VIDEO_RETRY_MS", "250"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.signaling.host, "rover.local");
        assert_eq!(config.signaling.port, 9000);
        assert_eq!(config.retry_delay(), Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == "SEND_VIDEO_PORT").then(|| "not-a-port".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                key: "SEND_VIDEO_PORT",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.signaling.host = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ice.stun_url = "http://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.media.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
