//! # Cable Streamer
//!
//! Captures a virtual-cable input device (VB-Cable's "CABLE Output") and
//! retransmits every captured PCM buffer, unmodified, to a fixed set of LAN
//! peers over UDP.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                               SENDER PC                              │
//! │                                                                      │
//! │  ┌──────────────┐      ┌──────────────────────────────────────────┐  │
//! │  │ CABLE Output │─────▶│   AudioSource (audio::capture, cpal)     │  │
//! │  └──────────────┘      │   callback chunks ─▶ FrameAccumulator    │  │
//! │                        └────────────────────┬─────────────────────┘  │
//! │                                             │ AudioBuffer (4096 B)   │
//! │                                             ▼                        │
//! │  ┌────────────┐  pause/   ┌──────────────────────────────────────┐   │
//! │  │ Controller │  stop     │     StreamEngine (engine::stream)    │   │
//! │  │ (bin/sender├──────────▶│  ControlState ─▶ capture ─▶ fan-out  │   │
//! │  │  menu)     │           └────────────────────┬─────────────────┘   │
//! │  └────────────┘                                │                     │
//! │                        ┌───────────────────────┼──────────────┐      │
//! │                        ▼                       ▼              ▼      │
//! │                 ┌─────────────┐         ┌─────────────┐   ┌──────┐   │
//! │                 │ Destination │         │ Destination │   │ ...  │   │
//! │                 │ UDP socket  │         │ UDP socket  │   │      │   │
//! │                 └──────┬──────┘         └──────┬──────┘   └──────┘   │
//! └────────────────────────┼───────────────────────┼─────────────────────┘
//!                          │ raw PCM, one datagram  │ per buffer
//!                          ▼                        ▼
//!                   10.0.0.5:12345           10.0.0.6:12345
//! ```

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod network;

pub use config::{AppConfig, AudioFormat, StreamConfig};
pub use engine::{ControlHandle, StreamEngine, StreamWorker};
pub use error::{NetworkError, Result, StreamError};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Capture sample rate
    pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

    /// Capture channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Frames delivered per captured buffer
    pub const DEFAULT_FRAMES_PER_BUFFER: u32 = 1024;

    /// Bytes per sample for 16-bit signed PCM
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// Destination UDP port shared by every peer
    pub const DEFAULT_UDP_PORT: u16 = 12345;

    /// Name fragment identifying the virtual-cable capture device
    pub const DEFAULT_DEVICE_MATCH: &str = "CABLE Output";

    /// Upper bound on how long a paused loop sleeps before re-reading control state
    pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// No audio callback for this long is treated as a dead device
    pub const CAPTURE_STALL_TIMEOUT: Duration = Duration::from_secs(2);

    /// Callback chunks queued between the device thread and the loop
    pub const CAPTURE_QUEUE_CAPACITY: usize = 64;
}
