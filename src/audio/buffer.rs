//! Captured PCM buffers
//!
//! Device callbacks hand over chunks of arbitrary length. The streaming loop
//! works in fixed-size buffers, so [`FrameAccumulator`] re-slices the
//! incoming samples into [`AudioBuffer`]s of exactly one period each.

use bytes::{BufMut, Bytes, BytesMut};

/// One fixed-size chunk of interleaved 16-bit little-endian PCM.
///
/// Cloning is cheap and never copies the samples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioBuffer {
    data: Bytes,
}

impl AudioBuffer {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Encode interleaved samples as little-endian PCM
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut data = BytesMut::with_capacity(samples.len() * 2);
        for sample in samples {
            data.put_i16_le(*sample);
        }
        Self { data: data.freeze() }
    }

    /// A buffer of `len` zero bytes
    pub fn silence(len: usize) -> Self {
        Self {
            data: Bytes::from(vec![0u8; len]),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of frames for the given channel count
    pub fn frames(&self, channels: u16) -> usize {
        self.data.len() / (2 * channels as usize)
    }
}

/// Re-slices variable-length sample chunks into fixed-size buffers
pub struct FrameAccumulator {
    pending: BytesMut,
    buffer_bytes: usize,
}

impl FrameAccumulator {
    /// `buffer_bytes` is the exact size of every emitted buffer
    pub fn new(buffer_bytes: usize) -> Self {
        assert!(buffer_bytes > 0, "buffer size must be non-zero");
        Self {
            pending: BytesMut::with_capacity(buffer_bytes * 2),
            buffer_bytes,
        }
    }

    /// Append samples from a device callback
    pub fn push_samples(&mut self, samples: &[i16]) {
        self.pending.reserve(samples.len() * 2);
        for sample in samples {
            self.pending.put_i16_le(*sample);
        }
    }

    /// Take one full buffer if enough audio is pending
    pub fn pop_buffer(&mut self) -> Option<AudioBuffer> {
        if self.pending.len() < self.buffer_bytes {
            return None;
        }
        let data = self.pending.split_to(self.buffer_bytes).freeze();
        Some(AudioBuffer { data })
    }

    /// Bytes waiting for the next full buffer
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    pub fn buffer_bytes(&self) -> usize {
        self.buffer_bytes
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
