//! Configuration system for txtline.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $TXTLINE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/txtline/config.toml
//!   3. ~/.config/txtline/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::wire::{FRAME_MAGIC, HEADER_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TxtlineConfig {
    pub protocol: ProtocolConfig,
    pub channel: ChannelConfig,
    pub server: ServerConfig,
}

/// Text rendering of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Lowercase hex, 2 characters per byte.
    Hex,
    /// RFC 4648 base32 without padding, 8 characters per 5 bytes.
    #[default]
    Base32,
}

impl Encoding {
    /// Raw payload bytes that fit in `budget` encoded characters,
    /// rounded down.
    pub fn bytes_for_chars(self, budget: usize) -> usize {
        match self {
            Encoding::Hex => budget / 2,
            Encoding::Base32 => budget * 5 / 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Hex => "hex",
            Encoding::Base32 => "base32",
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hex" => Ok(Encoding::Hex),
            "base32" => Ok(Encoding::Base32),
            other => Err(ConfigError::UnknownEncoding(other.to_string())),
        }
    }
}

/// Frame protocol parameters. Passed by value into the codec and the
/// fragmenter; nothing reads these from globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub encoding: Encoding,
    /// Characters available in one TXT string. DNS caps a string at 255;
    /// 250 leaves room for server-side variation.
    pub channel_budget: usize,
    /// Value expected in the first four header bytes.
    pub magic: u32,
    /// Most frames one message may need.
    pub max_frames: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Zone the records are served under.
    pub domain: String,
    /// Label between the frame label and the domain.
    pub subdomain: String,
    /// Prefix frame labels with a minutes-since-epoch bucket.
    pub time_prefix: bool,
    /// TTL of frame and manifest records, seconds.
    pub record_ttl: u32,
    /// TTL of queue-discovery answers, seconds.
    pub discovery_ttl: u32,
    /// Hex characters of the message id used in labels.
    pub id_prefix_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP API port on 127.0.0.1.
    pub api_port: u16,
    /// Persist a snapshot after every mutation.
    pub persistent: bool,
    pub data_file: PathBuf,
    /// Seconds between expiry sweeps.
    pub clean_interval_secs: u64,
    /// Messages older than this are swept. Seconds.
    pub message_ttl_secs: u64,
    /// Zone file loaded as one message at startup.
    pub zone_file: Option<PathBuf>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::default(),
            channel_budget: 250,
            magic: FRAME_MAGIC,
            max_frames: u16::MAX as usize,
        }
    }
}

impl ProtocolConfig {
    pub fn with_encoding(encoding: Encoding) -> Self {
        Self {
            encoding,
            ..Self::default()
        }
    }

    /// Fixed header length in bytes.
    pub fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    /// Payload bytes carried by one frame: the channel budget minus the
    /// header, divided by the encoding's expansion factor.
    pub fn payload_per_frame(&self) -> usize {
        self.encoding
            .bytes_for_chars(self.channel_budget.saturating_sub(self.header_size()))
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            domain: "covert.example.com".to_string(),
            subdomain: "data".to_string(),
            time_prefix: true,
            record_ttl: 300,
            discovery_ttl: 60,
            id_prefix_len: 16,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: 8080,
            persistent: false,
            data_file: data_dir().join("state.json"),
            clean_interval_secs: 3600,
            message_ttl_secs: 3600,
            zone_file: None,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("txtline")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("txtline")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("unknown encoding {0:?} (expected hex or base32)")]
    UnknownEncoding(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl TxtlineConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            TxtlineConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("TXTLINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&TxtlineConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply TXTLINE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("TXTLINE_PROTOCOL__ENCODING") {
            match v.parse() {
                Ok(e) => self.protocol.encoding = e,
                Err(e) => tracing::warn!(error = %e, "ignoring TXTLINE_PROTOCOL__ENCODING"),
            }
        }
        if let Some(v) = var("TXTLINE_CHANNEL__DOMAIN") {
            self.channel.domain = v;
        }
        if let Some(v) = var("TXTLINE_CHANNEL__TIME_PREFIX") {
            self.channel.time_prefix = v == "true" || v == "1";
        }
        if let Some(v) = var("TXTLINE_SERVER__API_PORT") {
            if let Ok(p) = v.parse() {
                self.server.api_port = p;
            }
        }
        if let Some(v) = var("TXTLINE_SERVER__PERSISTENT") {
            self.server.persistent = v == "true" || v == "1";
        }
        if let Some(v) = var("TXTLINE_SERVER__DATA_FILE") {
            self.server.data_file = PathBuf::from(v);
        }
        if let Some(v) = var("TXTLINE_SERVER__ZONE_FILE") {
            self.server.zone_file = Some(PathBuf::from(v));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn payload_per_frame_matches_encoding_overhead() {
        // (250 - 28) / 2
        assert_eq!(ProtocolConfig::with_encoding(Encoding::Hex).payload_per_frame(), 111);
        // floor((250 - 28) / 1.6)
        assert_eq!(
            ProtocolConfig::with_encoding(Encoding::Base32).payload_per_frame(),
            138
        );
    }

    #[test]
    fn tiny_budget_yields_zero_payload() {
        let config = ProtocolConfig {
            channel_budget: 10,
            ..ProtocolConfig::default()
        };
        assert_eq!(config.payload_per_frame(), 0);
    }

    #[test]
    fn encoding_parses_case_insensitively() {
        assert_eq!("HEX".parse::<Encoding>().unwrap(), Encoding::Hex);
        assert_eq!("base32".parse::<Encoding>().unwrap(), Encoding::Base32);
        assert!("base64".parse::<Encoding>().is_err());
    }

    #[test]
    fn overrides_apply_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("TXTLINE_PROTOCOL__ENCODING", "hex"),
            ("TXTLINE_CHANNEL__DOMAIN", "t.example.org"),
            ("TXTLINE_SERVER__PERSISTENT", "1"),
            ("TXTLINE_SERVER__API_PORT", "9999"),
        ]
        .into_iter()
        .collect();

        let mut config = TxtlineConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.protocol.encoding, Encoding::Hex);
        assert_eq!(config.channel.domain, "t.example.org");
        assert!(config.server.persistent);
        assert_eq!(config.server.api_port, 9999);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&TxtlineConfig::default()).unwrap();
        let parsed: TxtlineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.protocol.magic, FRAME_MAGIC);
        assert_eq!(parsed.channel.record_ttl, 300);
        assert_eq!(parsed.server.message_ttl_secs, 3600);
    }

    #[test]
    fn write_default_if_missing_creates_file() {
        let tmp = std::env::temp_dir().join(format!("txtline-config-test-{}", std::process::id()));
        let config_path = tmp.join("config.toml");
        std::fs::create_dir_all(&tmp).unwrap();

        unsafe {
            std::env::set_var("TXTLINE_CONFIG", config_path.to_str().unwrap());
        }

        let path = TxtlineConfig::write_default_if_missing().expect("write_default_if_missing failed");
        assert!(path.exists());

        let config = TxtlineConfig::load().expect("load should succeed");
        assert_eq!(config.channel.subdomain, "data");

        unsafe {
            std::env::remove_var("TXTLINE_CONFIG");
        }
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
