//! Streaming engine: capture loop, control state and background worker

pub mod control;
pub mod stream;
pub mod worker;

pub use control::{ControlHandle, ControlSnapshot, ControlState};
pub use stream::{StatsSnapshot, StreamEngine, StreamStats};
pub use worker::StreamWorker;
