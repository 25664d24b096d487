//! UDP destinations and buffer fan-out

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::audio::AudioBuffer;
use crate::config::StreamConfig;
use crate::error::NetworkError;

/// Repeat the send-failure warning for a destination once per this many
/// consecutive failures
const FAILURE_WARN_EVERY: u64 = 256;

/// Anything that can put one datagram on the wire
pub trait PacketSink: Send {
    fn transmit(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize>;
}

impl PacketSink for Socket {
    fn transmit(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.send_to(payload, &SockAddr::from(target))
    }
}

/// Create an unconnected UDP socket on an OS-assigned port, matching the
/// address family of `target`
pub fn create_socket(target: SocketAddr) -> Result<Socket, NetworkError> {
    let bind_failed = |e: io::Error| NetworkError::BindFailed {
        destination: target,
        reason: e.to_string(),
    };

    let socket = Socket::new(Domain::for_address(target), Type::DGRAM, Some(Protocol::UDP))
        .map_err(bind_failed)?;

    let local: SocketAddr = if target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    socket.bind(&local.into()).map_err(bind_failed)?;

    Ok(socket)
}

/// One peer: an outbound socket paired with its target address
pub struct Destination {
    target: SocketAddr,
    sink: Box<dyn PacketSink>,
    consecutive_failures: u64,
}

impl Destination {
    /// Open a dedicated UDP socket for `target`
    pub fn open(target: SocketAddr) -> Result<Self, NetworkError> {
        let socket = create_socket(target)?;
        Ok(Self::with_sink(target, socket))
    }

    pub fn with_sink(target: SocketAddr, sink: impl PacketSink + 'static) -> Self {
        Self {
            target,
            sink: Box::new(sink),
            consecutive_failures: 0,
        }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send one datagram. No retry.
    pub fn send(&mut self, buffer: &AudioBuffer) -> Result<usize, NetworkError> {
        match self.sink.transmit(buffer.as_bytes(), self.target) {
            Ok(sent) => {
                if self.consecutive_failures > 0 {
                    tracing::info!(
                        "Sends to {} recovered after {} failures",
                        self.target,
                        self.consecutive_failures
                    );
                    self.consecutive_failures = 0;
                }
                if sent != buffer.len() {
                    tracing::warn!("Partial send to {}: {} of {} bytes", self.target, sent, buffer.len());
                }
                Ok(sent)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                Err(NetworkError::SendFailed {
                    destination: self.target,
                    reason: e.to_string(),
                })
            }
        }
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }
}

/// Outcome of delivering one buffer to every destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub bytes_sent: usize,
}

/// The fixed list of destinations a stream fans out to
pub struct DestinationSet {
    destinations: Vec<Destination>,
}

impl DestinationSet {
    /// Open one socket per configured IP, in configuration order
    pub fn open(config: &StreamConfig) -> Result<Self, NetworkError> {
        let destinations = config
            .targets()
            .into_iter()
            .map(Destination::open)
            .collect::<Result<Vec<_>, _>>()?;

        for destination in &destinations {
            tracing::info!("Destination ready: {}", destination.target());
        }

        Ok(Self { destinations })
    }

    pub fn from_destinations(destinations: Vec<Destination>) -> Self {
        Self { destinations }
    }

    pub fn targets(&self) -> Vec<SocketAddr> {
        self.destinations.iter().map(Destination::target).collect()
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Send `buffer` once to every destination.
    ///
    /// A failing destination is logged and skipped; the rest are still
    /// attempted.
    pub fn fan_out(&mut self, buffer: &AudioBuffer) -> FanOutReport {
        let mut report = FanOutReport::default();

        for destination in &mut self.destinations {
            report.attempted += 1;
            match destination.send(buffer) {
                Ok(sent) => {
                    report.delivered += 1;
                    report.bytes_sent += sent;
                }
                Err(e) => {
                    report.failed += 1;
                    let streak = destination.consecutive_failures();
                    if streak == 1 || streak % FAILURE_WARN_EVERY == 0 {
                        tracing::warn!("{} (consecutive failures: {})", e, streak);
                    } else {
                        tracing::trace!("{}", e);
                    }
                }
            }
        }

        report
    }
}
