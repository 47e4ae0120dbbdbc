//! Timelapse session configuration.
//!
//! A configuration is validated once, before any component is built.
//! Invalid intervals, rates or session names are fatal at construction.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::store::FrameFormat;

/// Environment variable that overrides the default data directory.
pub const DATA_DIR_ENV: &str = "TIMELAPSE_DATA_DIR";

/// Session name used when none is configured.
pub const DEFAULT_TIMELAPSE_NAME: &str = "default";

/// Session name reserved for simulated components.
pub const SIMULATED_TIMELAPSE_NAME: &str = "fake";

/// Configuration for one timelapse session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelapseConfig {
    /// Identifier of the upstream image source.
    #[serde(default)]
    pub capture_source: String,
    /// Seconds between capture ticks.
    #[serde(default = "default_capture_interval")]
    pub capture_interval_seconds: f64,
    /// Playback rate in frames per second.
    #[serde(default = "default_playback_fps")]
    pub playback_fps: f64,
    /// Session name; frames live in `<data_dir>/<timelapse_name>`.
    #[serde(default)]
    pub timelapse_name: String,
    /// Image format of stored frames.
    #[serde(default)]
    pub frame_format: FrameFormat,
    /// JPEG quality (1-100), ignored for PNG.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Base directory holding one subdirectory per session.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_capture_interval() -> f64 {
    60.0
}

fn default_playback_fps() -> f64 {
    10.0
}

fn default_jpeg_quality() -> u8 {
    75
}

impl Default for TimelapseConfig {
    fn default() -> Self {
        Self {
            capture_source: String::new(),
            capture_interval_seconds: default_capture_interval(),
            playback_fps: default_playback_fps(),
            timelapse_name: String::new(),
            frame_format: FrameFormat::default(),
            jpeg_quality: default_jpeg_quality(),
            data_dir: None,
        }
    }
}

impl TimelapseConfig {
    /// Creates a configuration for the given source with default rates.
    pub fn new(capture_source: impl Into<String>) -> Self {
        Self {
            capture_source: capture_source.into(),
            ..Default::default()
        }
    }

    /// Validates the configuration and fills in the default session name.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.capture_source.trim().is_empty() {
            return Err(ConfigError::MissingSource);
        }
        if !self.capture_interval_seconds.is_finite()
            || self.capture_interval_seconds <= 0.0
            || to_duration(self.capture_interval_seconds).is_none()
        {
            return Err(ConfigError::InvalidCaptureInterval(
                self.capture_interval_seconds,
            ));
        }
        if !self.playback_fps.is_finite()
            || self.playback_fps <= 0.0
            || to_duration(1.0 / self.playback_fps).is_none()
        {
            return Err(ConfigError::InvalidPlaybackRate(self.playback_fps));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConfigError::InvalidQuality(self.jpeg_quality));
        }
        if self.timelapse_name.is_empty() {
            self.timelapse_name = DEFAULT_TIMELAPSE_NAME.to_string();
        }
        validate_name(&self.timelapse_name)?;
        Ok(())
    }

    /// Time between capture ticks.
    ///
    /// Saturates to zero or [`Duration::MAX`] on an unvalidated config.
    pub fn capture_interval(&self) -> Duration {
        saturating_duration(self.capture_interval_seconds)
    }

    /// Time each frame stays on screen during playback.
    pub fn playback_interval(&self) -> Duration {
        saturating_duration(1.0 / self.playback_fps)
    }

    /// Base data directory, resolved from config, environment, then `./timelapse-data`.
    pub fn base_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => PathBuf::from("timelapse-data"),
        }
    }

    /// Directory holding this session's frames.
    pub fn session_dir(&self) -> PathBuf {
        self.base_dir().join(&self.timelapse_name)
    }
}

/// Converts seconds to a duration that a deadline can be computed from.
fn to_duration(seconds: f64) -> Option<Duration> {
    let duration = Duration::try_from_secs_f64(seconds).ok()?;
    Instant::now().checked_add(duration)?;
    Some(duration)
}

fn saturating_duration(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    let bad = name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(ConfigError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("capture_source must be non-empty. Example value: your_webcam_name_here")]
    MissingSource,
    #[error("capture_interval_seconds must be greater than 0 (got {0})")]
    InvalidCaptureInterval(f64),
    #[error("playback_fps must be greater than 0 (got {0})")]
    InvalidPlaybackRate(f64),
    #[error("jpeg_quality must be between 1 and 100 (got {0})")]
    InvalidQuality(u8),
    #[error("timelapse_name {0:?} is not a valid directory name")]
    InvalidName(String),
    #[error("source command must name a program")]
    EmptyCommand,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[timelapse]` session settings.
    #[serde(default)]
    pub timelapse: TimelapseConfig,
    /// `[source]` capture command settings.
    #[serde(default)]
    pub source: SourceConfig,
    /// `[metrics]` exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Settings for the command-backed image source.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceConfig {
    /// Program and arguments that print one encoded image to stdout.
    #[serde(default)]
    pub command: Vec<String>,
    /// Kill the program if it runs longer than this.
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
}

impl SourceConfig {
    /// Timeout applied to each capture command, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Metrics server port (0 to disable).
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { port: 9090 }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.timelapse.validate()?;
        Ok(config)
    }
}
