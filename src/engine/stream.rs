//! The capture-to-network streaming loop

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::{AudioBackend, AudioBuffer, AudioSource};
use crate::config::StreamConfig;
use crate::constants::PAUSE_POLL_INTERVAL;
use crate::engine::control::{ControlHandle, ControlState};
use crate::error::Result;
use crate::network::{DestinationSet, FanOutReport};

/// Live counters updated by the loop
#[derive(Debug, Default)]
pub struct StreamStats {
    buffers_captured: AtomicU64,
    fan_out_cycles: AtomicU64,
    datagrams_sent: AtomicU64,
    send_failures: AtomicU64,
    bytes_sent: AtomicU64,
}

impl StreamStats {
    fn record_capture(&self, _buffer: &AudioBuffer) {
        self.buffers_captured.fetch_add(1, Ordering::Relaxed);
    }

    fn record_fan_out(&self, report: &FanOutReport) {
        self.datagrams_sent
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.send_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        self.bytes_sent
            .fetch_add(report.bytes_sent as u64, Ordering::Relaxed);
        // Last, so a completed cycle is only visible with its totals
        self.fan_out_cycles.fetch_add(1, Ordering::Release);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            buffers_captured: self.buffers_captured.load(Ordering::Relaxed),
            fan_out_cycles: self.fan_out_cycles.load(Ordering::Acquire),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

/// Copy of the stream counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub buffers_captured: u64,
    pub fan_out_cycles: u64,
    pub datagrams_sent: u64,
    pub send_failures: u64,
    pub bytes_sent: u64,
}

/// Captures audio from one input device and fans every buffer out to a fixed
/// set of UDP destinations.
///
/// Destinations are opened at construction. The audio device is opened by
/// [`start`](StreamEngine::start), which consumes the engine, so the device
/// stream and every socket are released exactly once when it returns, on
/// every exit path.
///
/// Pause and stop are driven through a [`ControlHandle`] from any thread.
pub struct StreamEngine<B: AudioBackend> {
    config: StreamConfig,
    backend: B,
    destinations: DestinationSet,
    control: Arc<ControlState>,
    stats: Arc<StreamStats>,
}

impl<B: AudioBackend> StreamEngine<B> {
    /// Build an engine with one UDP socket per configured destination
    pub fn new(config: StreamConfig, backend: B) -> Result<Self> {
        let destinations = DestinationSet::open(&config)?;
        Ok(Self::with_destinations(config, backend, destinations))
    }

    pub fn with_destinations(config: StreamConfig, backend: B, destinations: DestinationSet) -> Self {
        Self {
            config,
            backend,
            destinations,
            control: Arc::new(ControlState::new()),
            stats: Arc::new(StreamStats::default()),
        }
    }

    pub fn control(&self) -> ControlHandle {
        ControlHandle::new(self.control.clone(), self.stats.clone())
    }

    /// Toggle pause; returns `true` when now paused
    pub fn pause_resume(&self) -> bool {
        self.control().pause_resume()
    }

    pub fn stop(&self) {
        self.control().stop()
    }

    pub fn destination_targets(&self) -> Vec<SocketAddr> {
        self.destinations.targets()
    }

    /// Open the input device and stream until stopped or a fatal error.
    ///
    /// Blocks the calling thread. Use [`StreamWorker`](crate::StreamWorker)
    /// to run it in the background.
    pub fn start(self) -> Result<()> {
        let Self {
            config,
            backend,
            mut destinations,
            control,
            stats,
        } = self;

        let result = stream(&config, &backend, &mut destinations, &control, &stats);

        // Sockets close here; the audio source was released when `stream` returned
        drop(destinations);

        // Late pause/stop calls become no-ops
        control.stop();

        let totals = stats.snapshot();
        match &result {
            Ok(()) => tracing::info!(
                "Stream finished: {} buffers captured, {} datagrams sent, {} send failures",
                totals.buffers_captured,
                totals.datagrams_sent,
                totals.send_failures
            ),
            Err(e) => tracing::error!(
                "Stream aborted after {} buffers: {}",
                totals.buffers_captured,
                e
            ),
        }

        result
    }
}

fn stream<B: AudioBackend>(
    config: &StreamConfig,
    backend: &B,
    destinations: &mut DestinationSet,
    control: &ControlState,
    stats: &StreamStats,
) -> Result<()> {
    let index = backend.find_input_device_index(config.device_match())?;
    let mut source = backend.open_input(index, config.format())?;

    tracing::info!(
        "Streaming {} to {} destination(s) on port {}",
        source.device_name(),
        destinations.len(),
        config.port()
    );

    capture_loop(source.as_mut(), destinations, control, stats)
}

/// One iteration: observe control state, then capture a buffer and fan it out.
/// A pause or stop requested mid-iteration takes effect on the next one.
fn capture_loop(
    source: &mut dyn AudioSource,
    destinations: &mut DestinationSet,
    control: &ControlState,
    stats: &StreamStats,
) -> Result<()> {
    let mut was_paused = false;

    loop {
        let flags = control.snapshot();
        if flags.terminated {
            return Ok(());
        }

        if flags.paused {
            control.wait_while_paused(PAUSE_POLL_INTERVAL);
            was_paused = true;
            continue;
        }

        if was_paused {
            source.discard_pending();
            was_paused = false;
        }

        let buffer = match source.read_buffer() {
            Ok(buffer) => buffer,
            Err(e) if control.is_terminated() => {
                tracing::debug!("Capture ended during shutdown: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        stats.record_capture(&buffer);

        if control.is_terminated() {
            return Ok(());
        }

        let report = destinations.fan_out(&buffer);
        stats.record_fan_out(&report);
    }
}
