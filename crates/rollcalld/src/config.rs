//! Daemon configuration, loaded from a TOML file.
//!
//! Path comes from `ROLLCALL_CONFIG`, falling back to
//! `/etc/rollcall/config.toml`; a missing file yields the defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/rollcall/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub models: ModelConfig,
    pub matching: MatchingConfig,
    pub sampling: SamplingConfig,
    pub storage: StorageConfig,
    pub announcer: AnnouncerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// V4L2 device path.
    pub device: String,
    /// Frames to discard at stream start (camera AGC/AE stabilization).
    pub warmup_frames: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            warmup_frames: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("/usr/share/rollcall/models"),
        }
    }
}

impl ModelConfig {
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(rollcall_vision::DETECTOR_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    pub fn embedder_model_path(&self) -> String {
        self.model_dir
            .join(rollcall_vision::EMBEDDER_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Euclidean distance threshold for a positive match.
    pub threshold: f32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: rollcall_core::DEFAULT_MATCH_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Run detection/matching on every Nth frame.
    pub interval: u32,
    /// Downscale factor applied before detection.
    pub downscale: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval: rollcall_core::DEFAULT_SAMPLE_INTERVAL,
            downscale: rollcall_core::DEFAULT_DOWNSCALE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory of registration images (filename stem = identity).
    pub faces_dir: PathBuf,
    /// SQLite attendance database path.
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            faces_dir: PathBuf::from("/var/lib/rollcall/faces"),
            db_path: PathBuf::from("/var/lib/rollcall/attendance.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnnouncerConfig {
    pub enabled: bool,
    /// Text-to-speech program; receives the announcement as its argument.
    pub command: String,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "espeak".to_string(),
        }
    }
}

impl Config {
    /// Load from `ROLLCALL_CONFIG` or the default path.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("ROLLCALL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }
}
