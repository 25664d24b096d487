//! Error types for the audio streamer

use std::net::SocketAddr;

use thiserror::Error;

/// Main error type for the streamer.
///
/// Every variant except [`StreamError::Network`] is fatal to a streaming
/// session. Per-destination send failures are reported as
/// [`NetworkError::SendFailed`] and stay inside fan-out.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("No input device matches \"{name}\"")]
    DeviceNotFound { name: String },

    #[error("Failed to open input device \"{device}\": {reason}")]
    DeviceOpen { device: String, reason: String },

    #[error("Capture from \"{device}\" failed: {reason}")]
    Capture { device: String, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Streaming thread failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    pub fn device_open(device: impl Into<String>, reason: impl ToString) -> Self {
        Self::DeviceOpen {
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    pub fn capture(device: impl Into<String>, reason: impl ToString) -> Self {
        Self::Capture {
            device: device.into(),
            reason: reason.to_string(),
        }
    }
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Invalid destination address: {0}")]
    InvalidAddress(String),

    #[error("Socket setup for {destination} failed: {reason}")]
    BindFailed {
        destination: SocketAddr,
        reason: String,
    },

    #[error("Send to {destination} failed: {reason}")]
    SendFailed {
        destination: SocketAddr,
        reason: String,
    },
}

/// Result type alias for the streamer
pub type Result<T> = std::result::Result<T, StreamError>;
