//! Application configuration
//!
//! Loaded from TOML. Every section falls back to its defaults, so a config
//! file only needs the keys it wants to change.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub stream: StreamConfig,
    pub watchdog: WatchdogConfig,
    pub connection: ConnectionConfig,
    pub output: OutputConfig,
}

/// Batching and playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Messages per batch. Higher is smoother but adds latency
    /// (1 chunk = 33 ms, 30 chunks = 0.99 s).
    pub minimum_chunk_size: usize,
    pub frame_interval_ms: u64,
    /// Always 16 kHz; kept in the config so a mismatch is caught at startup.
    pub sample_rate: u32,
    pub max_queued_batches: usize,
    pub fade_samples: usize,
    pub volume: f32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            minimum_chunk_size: DEFAULT_MINIMUM_CHUNK_SIZE,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            sample_rate: SAMPLE_RATE,
            max_queued_batches: DEFAULT_MAX_QUEUED_BATCHES,
            fade_samples: DEFAULT_FADE_SAMPLES,
            volume: 1.0,
        }
    }
}

impl StreamConfig {
    /// Stream config with a custom batch size
    pub fn with_chunk_size(minimum_chunk_size: usize) -> Self {
        Self {
            minimum_chunk_size,
            ..Self::default()
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Idle time after which the watchdog sends silence
    pub fn silence_threshold(&self) -> Duration {
        self.frame_interval() * self.minimum_chunk_size as u32
    }

    /// Size of one silence message in bytes
    pub fn silence_len(&self) -> usize {
        AUDIO_PAYLOAD_SIZE * self.minimum_chunk_size
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.minimum_chunk_size == 0 {
            return Err(Error::Config("minimum_chunk_size must be positive".into()));
        }
        if self.frame_interval_ms == 0 {
            return Err(Error::Config("frame_interval_ms must be positive".into()));
        }
        if self.sample_rate != SAMPLE_RATE {
            return Err(Error::Config(format!(
                "sample_rate must be {}, got {}",
                SAMPLE_RATE, self.sample_rate
            )));
        }
        if self.max_queued_batches == 0 {
            return Err(Error::Config("max_queued_batches must be positive".into()));
        }
        if !(0.0..=4.0).contains(&self.volume) {
            return Err(Error::Config(format!("volume out of range: {}", self.volume)));
        }
        Ok(())
    }
}

/// Silence watchdog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub enabled: bool,
    pub poll_interval_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: DEFAULT_WATCHDOG_POLL_MS,
        }
    }
}

impl WatchdogConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Upstream connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub url: String,
    pub session_token: Option<String>,
    /// Optional websocket that broadcasts voice audio. Every binary message
    /// it sends is forwarded upstream unchanged.
    pub audio_source_url: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            session_token: None,
            audio_source_url: None,
        }
    }
}

/// Host output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory to dump presented frames into; frames are only counted when unset
    pub frame_dir: Option<PathBuf>,
    pub frame_queue_capacity: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            frame_dir: None,
            frame_queue_capacity: DEFAULT_FRAME_QUEUE_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("ai", "lipsync", "lipsync-stream")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load from the default location, falling back to defaults when no file exists
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to a file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.stream.validate()?;
        if self.output.frame_queue_capacity == 0 {
            return Err(Error::Config("frame_queue_capacity must be positive".into()));
        }
        Ok(())
    }
}
