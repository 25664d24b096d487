//! Application and stream configuration
//!
//! [`AppConfig`] is the on-disk TOML shape. [`StreamConfig`] is the validated,
//! immutable form the engine is built from.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Result, StreamError};

/// PCM sample encoding on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// 16-bit signed little-endian
    I16,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::I16 => BYTES_PER_SAMPLE,
        }
    }
}

/// Capture format requested from the input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
    pub frames_per_buffer: u32,
}

impl AudioFormat {
    /// Size in bytes of one captured buffer
    pub fn buffer_bytes(&self) -> usize {
        self.frames_per_buffer as usize
            * self.channels as usize
            * self.sample_format.bytes_per_sample()
    }

    /// Real-time duration of one buffer
    pub fn buffer_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(
            f64::from(self.frames_per_buffer) / f64::from(self.sample_rate),
        )
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_format: SampleFormat::I16,
            channels: DEFAULT_CHANNELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
        }
    }
}

/// Audio section of the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Substring matched against input device names
    pub device_match: String,
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub channels: u16,
    pub frames_per_buffer: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let format = AudioFormat::default();
        Self {
            device_match: DEFAULT_DEVICE_MATCH.to_string(),
            sample_format: format.sample_format,
            sample_rate: format.sample_rate,
            channels: format.channels,
            frames_per_buffer: format.frames_per_buffer,
        }
    }
}

/// Network section of the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Destination IP literals, in send order
    pub destinations: Vec<String>,
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            destinations: Vec::new(),
            port: DEFAULT_UDP_PORT,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub audio: AudioConfig,
    pub network: NetworkConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            audio: AudioConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl AppConfig {
    /// Platform config file location, e.g. `~/.config/cable-streamer/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cable-streamer").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from an explicit path. The file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load from the platform default path, falling back to defaults when absent
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| StreamError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StreamError::Config(e.to_string()))
    }

    /// Write the config, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

/// Validated, immutable stream configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    destinations: Vec<IpAddr>,
    port: u16,
    format: AudioFormat,
    device_match: String,
}

impl StreamConfig {
    /// Build a config for the given destination IPs and port with the default
    /// capture format and device match.
    pub fn new<S: AsRef<str>>(destinations: &[S], port: u16) -> Result<Self> {
        Self::with_format(destinations, port, AudioFormat::default(), DEFAULT_DEVICE_MATCH)
    }

    pub fn with_format<S: AsRef<str>>(
        destinations: &[S],
        port: u16,
        format: AudioFormat,
        device_match: &str,
    ) -> Result<Self> {
        if destinations.is_empty() {
            return Err(StreamError::Config(
                "at least one destination IP is required".into(),
            ));
        }
        if port == 0 {
            return Err(StreamError::Config("destination port must be 1-65535".into()));
        }
        if format.channels == 0 || format.sample_rate == 0 || format.frames_per_buffer == 0 {
            return Err(StreamError::Config(format!(
                "invalid capture format: {} ch, {} Hz, {} frames",
                format.channels, format.sample_rate, format.frames_per_buffer
            )));
        }

        let destinations = destinations
            .iter()
            .map(|ip| {
                let ip = ip.as_ref().trim();
                ip.parse::<IpAddr>()
                    .map_err(|_| StreamError::Config(format!("not an IP address: {:?}", ip)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            destinations,
            port,
            format,
            device_match: device_match.to_string(),
        })
    }

    /// Validate the file config into a stream config
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        let format = AudioFormat {
            sample_format: config.audio.sample_format,
            channels: config.audio.channels,
            sample_rate: config.audio.sample_rate,
            frames_per_buffer: config.audio.frames_per_buffer,
        };
        Self::with_format(
            &config.network.destinations[..],
            config.network.port,
            format,
            &config.audio.device_match,
        )
    }

    pub fn destinations(&self) -> &[IpAddr] {
        &self.destinations
    }

    /// `(ip, port)` targets in configuration order
    pub fn targets(&self) -> Vec<SocketAddr> {
        self.destinations
            .iter()
            .map(|ip| SocketAddr::new(*ip, self.port))
            .collect()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn device_match(&self) -> &str {
        &self.device_match
    }
}
