//! Audio capture from the virtual-cable input device
//!
//! cpal pushes samples from its own callback thread. The callback copies each
//! chunk into a bounded channel; the streaming loop pulls chunks on demand and
//! re-slices them into fixed-size buffers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::audio::buffer::{AudioBuffer, FrameAccumulator};
use crate::audio::device::AudioSource;
use crate::config::AudioFormat;
use crate::constants::{CAPTURE_QUEUE_CAPACITY, CAPTURE_STALL_TIMEOUT};
use crate::error::{Result, StreamError};

/// An open cpal input stream
pub struct CpalSource {
    /// Kept alive for the lifetime of the source; dropping it stops capture
    stream: cpal::Stream,

    device_name: String,

    chunks: Receiver<Vec<i16>>,

    /// Errors raised by the device callback thread
    errors: Receiver<String>,

    accumulator: FrameAccumulator,

    /// Chunks dropped because the loop was not reading (paused or slow)
    dropped_chunks: Arc<AtomicU64>,

    stall_timeout: Duration,
}

impl CpalSource {
    /// Open and start an input stream on `device` with the requested format.
    ///
    /// 16-bit input is preferred. A device that only offers a float mix
    /// format is captured as f32 and converted to 16-bit in the callback.
    pub fn open(device: cpal::Device, format: &AudioFormat) -> Result<Self> {
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let (chunk_tx, chunks) = bounded::<Vec<i16>>(CAPTURE_QUEUE_CAPACITY);
        let (error_tx, errors) = bounded::<String>(16);
        let dropped_chunks = Arc::new(AtomicU64::new(0));
        let taps = CallbackTaps {
            chunks: chunk_tx,
            errors: error_tx,
            dropped: dropped_chunks.clone(),
        };

        let opened = open_stream(&device, &device_name, format, NativeFormat::I16, &taps);
        let (stream, native) = match opened {
            Ok(stream) => (stream, NativeFormat::I16),
            Err(e) => {
                let default_format = device.default_input_config().map(|c| c.sample_format());
                if !matches!(default_format, Ok(cpal::SampleFormat::F32)) {
                    return Err(StreamError::device_open(&device_name, e));
                }
                tracing::debug!("{} rejected 16-bit input ({}), capturing f32", device_name, e);
                let stream = open_stream(&device, &device_name, format, NativeFormat::F32, &taps)
                    .map_err(|e| StreamError::device_open(&device_name, e))?;
                (stream, NativeFormat::F32)
            }
        };

        stream
            .play()
            .map_err(|e| StreamError::device_open(&device_name, e))?;

        tracing::info!(
            "Capturing from {} ({} Hz, {} ch, {} frames/buffer, native {:?})",
            device_name,
            format.sample_rate,
            format.channels,
            format.frames_per_buffer,
            native
        );

        Ok(Self {
            stream,
            device_name,
            chunks,
            errors,
            accumulator: FrameAccumulator::new(format.buffer_bytes()),
            dropped_chunks,
            stall_timeout: CAPTURE_STALL_TIMEOUT,
        })
    }

    /// Chunks the callback could not queue
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }
}

/// Sample type the device delivers to the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NativeFormat {
    I16,
    F32,
}

/// Channel ends shared with the device callback thread
#[derive(Clone)]
struct CallbackTaps {
    chunks: Sender<Vec<i16>>,
    errors: Sender<String>,
    dropped: Arc<AtomicU64>,
}

impl CallbackTaps {
    fn push(&self, chunk: Vec<i16>) {
        if self.chunks.try_send(chunk).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn report(&self, err: cpal::StreamError) {
        let _ = self.errors.try_send(err.to_string());
    }
}

/// Scale a float sample in [-1.0, 1.0] to 16-bit PCM, clipping out-of-range input
fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

/// Build with a fixed period first. Some hosts refuse fixed period sizes;
/// the accumulator copes with any size, so the host default is the fallback.
fn open_stream(
    device: &cpal::Device,
    device_name: &str,
    format: &AudioFormat,
    native: NativeFormat,
    taps: &CallbackTaps,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError> {
    let mut config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Fixed(format.frames_per_buffer),
    };

    match build_stream(device, &config, native, taps) {
        Ok(stream) => Ok(stream),
        Err(e) => {
            tracing::debug!(
                "Fixed buffer size rejected by {} ({:?}): {}, retrying with host default",
                device_name,
                native,
                e
            );
            config.buffer_size = cpal::BufferSize::Default;
            build_stream(device, &config, native, taps)
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    native: NativeFormat,
    taps: &CallbackTaps,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError> {
    let data_taps = taps.clone();
    let error_taps = taps.clone();

    match native {
        NativeFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| data_taps.push(data.to_vec()),
            move |err| error_taps.report(err),
            None,
        ),
        NativeFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                data_taps.push(data.iter().copied().map(f32_to_i16).collect())
            },
            move |err| error_taps.report(err),
            None,
        ),
    }
}

impl AudioSource for CpalSource {
    fn read_buffer(&mut self) -> Result<AudioBuffer> {
        loop {
            if let Some(buffer) = self.accumulator.pop_buffer() {
                return Ok(buffer);
            }

            if let Ok(reason) = self.errors.try_recv() {
                return Err(StreamError::capture(&self.device_name, reason));
            }

            match self.chunks.recv_timeout(self.stall_timeout) {
                Ok(chunk) => self.accumulator.push_samples(&chunk),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(StreamError::capture(
                        &self.device_name,
                        format!("no audio delivered for {:?}", self.stall_timeout),
                    ));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(StreamError::capture(&self.device_name, "input stream closed"));
                }
            }
        }
    }

    fn discard_pending(&mut self) {
        let stale = self.chunks.try_iter().count();
        self.accumulator.clear();
        if stale > 0 {
            tracing::debug!("Discarded {} stale capture chunks", stale);
        }
    }

    fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            tracing::debug!("Failed to pause {} on close: {}", self.device_name, e);
        }
        tracing::info!(
            "Closed input stream {} ({} chunks dropped)",
            self.device_name,
            self.dropped_chunks()
        );
    }
}
