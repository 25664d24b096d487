//! Pause/terminate control shared between the streaming loop and its controller

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Point-in-time view of both control flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlSnapshot {
    pub paused: bool,
    pub terminated: bool,
}

/// The two control flags behind one lock, so they are never read torn.
///
/// `terminated` only ever goes from `false` to `true`. Once it is set,
/// `paused` is frozen as well.
#[derive(Debug, Default)]
pub struct ControlState {
    flags: Mutex<ControlSnapshot>,
    changed: Condvar,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip `paused` and return the new value
    pub fn pause_resume(&self) -> bool {
        self.toggle_paused().unwrap_or_else(|| self.is_paused())
    }

    /// Flip `paused` unless terminated. `None` means the flag was left alone.
    pub fn toggle_paused(&self) -> Option<bool> {
        let mut flags = self.flags.lock();
        if flags.terminated {
            return None;
        }
        flags.paused = !flags.paused;
        self.changed.notify_all();
        Some(flags.paused)
    }

    /// Request termination. Returns `true` only for the call that set the flag.
    pub fn stop(&self) -> bool {
        let mut flags = self.flags.lock();
        if flags.terminated {
            return false;
        }
        flags.terminated = true;
        self.changed.notify_all();
        true
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        *self.flags.lock()
    }

    pub fn is_paused(&self) -> bool {
        self.flags.lock().paused
    }

    pub fn is_terminated(&self) -> bool {
        self.flags.lock().terminated
    }

    /// While paused, sleep until the flags change or `timeout` elapses.
    ///
    /// Returns immediately when not paused or already terminated.
    pub fn wait_while_paused(&self, timeout: Duration) -> ControlSnapshot {
        let mut flags = self.flags.lock();
        if flags.paused && !flags.terminated {
            self.changed.wait_for(&mut flags, timeout);
        }
        *flags
    }
}

/// Cloneable handle the controller uses to drive a running engine.
///
/// The handle only ever touches the control flags and read-only counters,
/// never the engine's sockets or audio source.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    state: Arc<ControlState>,
    stats: Arc<super::StreamStats>,
}

impl ControlHandle {
    pub(crate) fn new(state: Arc<ControlState>, stats: Arc<super::StreamStats>) -> Self {
        Self { state, stats }
    }

    /// Toggle pause; returns `true` when now paused
    pub fn pause_resume(&self) -> bool {
        match self.state.toggle_paused() {
            Some(paused) => {
                tracing::debug!("Stream {}", if paused { "paused" } else { "resumed" });
                paused
            }
            None => self.state.is_paused(),
        }
    }

    /// Ask the loop to exit. Safe to call any number of times.
    pub fn stop(&self) {
        if self.state.stop() {
            tracing::info!("Stop requested");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }

    pub fn stats(&self) -> super::StatsSnapshot {
        self.stats.snapshot()
    }
}
