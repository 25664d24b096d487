//! Fake audio devices and sockets for driving the engine without hardware.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cable_streamer::audio::{AudioBackend, AudioBuffer, AudioSource, DeviceIndex, InputDeviceInfo};
use cable_streamer::network::{Destination, DestinationSet, PacketSink};
use cable_streamer::{AudioFormat, Result, StreamConfig, StreamEngine, StreamError};
use crossbeam_channel::{unbounded, Receiver, Sender};

pub const CABLE: &str = "CABLE Output (VB-Audio Virtual Cable)";

/// Counters shared between fakes and the test body
#[derive(Clone, Default)]
pub struct Tally {
    pub reads_started: Arc<AtomicUsize>,
    pub reads: Arc<AtomicUsize>,
    pub sources_opened: Arc<AtomicUsize>,
    pub sources_closed: Arc<AtomicUsize>,
    pub discards: Arc<AtomicUsize>,
    pub sockets_closed: Arc<AtomicUsize>,
    pub sent: Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>,
}

impl Tally {
    pub fn reads_started(&self) -> usize {
        self.reads_started.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn sources_opened(&self) -> usize {
        self.sources_opened.load(Ordering::SeqCst)
    }

    pub fn sources_closed(&self) -> usize {
        self.sources_closed.load(Ordering::SeqCst)
    }

    pub fn discards(&self) -> usize {
        self.discards.load(Ordering::SeqCst)
    }

    pub fn sockets_closed(&self) -> usize {
        self.sockets_closed.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, target: SocketAddr) -> Vec<Vec<u8>> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| *to == target)
            .map(|(_, payload)| payload)
            .collect()
    }
}

/// Source whose buffers are pushed by the test. A closed feed is a capture error.
pub struct FeedSource {
    feed: Receiver<AudioBuffer>,
    tally: Tally,
}

impl AudioSource for FeedSource {
    fn read_buffer(&mut self) -> Result<AudioBuffer> {
        self.tally.reads_started.fetch_add(1, Ordering::SeqCst);
        let buffer = self
            .feed
            .recv()
            .map_err(|_| StreamError::capture(CABLE, "feed closed"))?;
        self.tally.reads.fetch_add(1, Ordering::SeqCst);
        Ok(buffer)
    }

    /// Drops whatever the test queued while the engine was paused
    fn discard_pending(&mut self) {
        self.feed.try_iter().for_each(drop);
        self.tally.discards.fetch_add(1, Ordering::SeqCst);
    }

    fn device_name(&self) -> &str {
        CABLE
    }
}

impl Drop for FeedSource {
    fn drop(&mut self) {
        self.tally.sources_closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeBackend {
    devices: Vec<String>,
    feed: Mutex<Option<Receiver<AudioBuffer>>>,
    fail_open: bool,
    tally: Tally,
}

impl FakeBackend {
    /// Every `open_input` fails as if the device were held exclusively elsewhere
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

impl AudioBackend for FakeBackend {
    fn input_devices(&self) -> Result<Vec<InputDeviceInfo>> {
        Ok(self
            .devices
            .iter()
            .enumerate()
            .map(|(index, name)| InputDeviceInfo {
                index,
                name: name.clone(),
                is_default: index == 0,
                sample_rates: vec![44100],
                channels: vec![2],
            })
            .collect())
    }

    fn open_input(&self, index: DeviceIndex, _format: &AudioFormat) -> Result<Box<dyn AudioSource>> {
        if self.fail_open {
            return Err(StreamError::device_open(&self.devices[index], "device in use"));
        }
        let feed = self
            .feed
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| StreamError::device_open(&self.devices[index], "already open"))?;
        self.tally.sources_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FeedSource {
            feed,
            tally: self.tally.clone(),
        }))
    }
}

/// Records datagrams instead of sending them
pub struct RecordingSink {
    fail: bool,
    tally: Tally,
}

impl PacketSink for RecordingSink {
    fn transmit(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::Other, "host unreachable"));
        }
        self.tally.sent.lock().unwrap().push((target, payload.to_vec()));
        Ok(payload.len())
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        self.tally.sockets_closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub feed: Sender<AudioBuffer>,
    pub tally: Tally,
}

pub fn backend(devices: &[&str]) -> (FakeBackend, Sender<AudioBuffer>, Tally) {
    let (feed, rx) = unbounded();
    let tally = Tally::default();
    let backend = FakeBackend {
        devices: devices.iter().map(|d| d.to_string()).collect(),
        feed: Mutex::new(Some(rx)),
        fail_open: false,
        tally: tally.clone(),
    };
    (backend, feed, tally)
}

/// Engine with recording sinks. Destinations listed in `failing` reject every send.
pub fn engine(ips: &[&str], failing: &[usize], devices: &[&str]) -> (StreamEngine<FakeBackend>, Harness) {
    let (backend, feed, tally) = backend(devices);
    engine_on(backend, feed, tally, ips, failing)
}

/// Engine whose CABLE device is listed but cannot be opened
pub fn engine_failing_open(ips: &[&str]) -> (StreamEngine<FakeBackend>, Harness) {
    let (backend, feed, tally) = backend(&[CABLE]);
    engine_on(backend.failing_open(), feed, tally, ips, &[])
}

fn engine_on(
    backend: FakeBackend,
    feed: Sender<AudioBuffer>,
    tally: Tally,
    ips: &[&str],
    failing: &[usize],
) -> (StreamEngine<FakeBackend>, Harness) {
    let config = StreamConfig::new(ips, 12345).unwrap();

    let destinations = config
        .targets()
        .into_iter()
        .enumerate()
        .map(|(i, target)| {
            Destination::with_sink(
                target,
                RecordingSink {
                    fail: failing.contains(&i),
                    tally: tally.clone(),
                },
            )
        })
        .collect();

    let engine = StreamEngine::with_destinations(config, backend, DestinationSet::from_destinations(destinations));
    (engine, Harness { feed, tally })
}

pub fn pcm(tag: i16) -> AudioBuffer {
    AudioBuffer::from_samples(&[tag; 8])
}

pub fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

/// Poll `done` until it holds or `deadline` passes
pub fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    done()
}
