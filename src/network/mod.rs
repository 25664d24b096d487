//! Network subsystem for UDP audio transport

pub mod destination;

pub use destination::{create_socket, Destination, DestinationSet, FanOutReport, PacketSink};
