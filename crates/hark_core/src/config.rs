//! Capture and Stream Configuration
//!
//! # Storage Locations
//! - Linux: `~/.config/hark/config.json`
//! - Windows: `%APPDATA%\hark\config.json`
//! - macOS: `~/Library/Application Support/hark/config.json`

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Audio stream configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: u32,

    /// Number of interleaved channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Buffer size in frames; `None` lets the backend pick its default period
    #[serde(default)]
    pub buffer_size: Option<u32>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            buffer_size: None,
        }
    }
}

impl StreamConfig {
    /// Latency in milliseconds for a fixed buffer size, if one was requested
    pub fn latency_ms(&self) -> Option<f32> {
        self.buffer_size
            .map(|frames| (frames as f32 / self.sample_rate as f32) * 1000.0)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(format!("Invalid sample rate: {}", self.sample_rate));
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(format!("Invalid channel count: {}", self.channels));
        }
        if let Some(frames) = self.buffer_size {
            if !(32..=8192).contains(&frames) {
                return Err(format!("Invalid buffer size: {}", frames));
            }
        }
        Ok(())
    }
}

/// Everything a capture session needs to open a device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Audio host to open (e.g. "ALSA", "JACK", "WASAPI"); `None` = platform default
    #[serde(default)]
    pub host: Option<String>,

    /// Substring of the capture device name; `None` or empty = system default
    #[serde(default)]
    pub device_name: Option<String>,

    #[serde(default)]
    pub stream: StreamConfig,
}

impl CaptureConfig {
    /// Config for the default device of the default host
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            host: None,
            device_name: None,
            stream: StreamConfig {
                sample_rate,
                channels,
                buffer_size: None,
            },
        }
    }

    /// Builder-style device fragment
    pub fn with_device(mut self, fragment: impl Into<String>) -> Self {
        self.device_name = Some(fragment.into());
        self
    }

    /// The device fragment, with empty strings treated as "use the default"
    pub fn device_fragment(&self) -> Option<&str> {
        self.device_name.as_deref().filter(|name| !name.is_empty())
    }

    /// Load config from the per-user location, or defaults if missing/corrupt
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    /// Load config from an explicit path
    pub fn load_from(path: &Path) -> Option<Self> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to open config file {:?}: {}", path, e);
                return None;
            }
        };

        match serde_json::from_reader(file) {
            Ok(config) => {
                info!("Config loaded from {:?}", path);
                Some(config)
            }
            Err(e) => {
                error!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Per-user config file path
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "hark", "hark").map(|dirs| dirs.config_dir().join("config.json"))
    }
}
