//! Voxpipe I/O
//!
//! The outbound transport collaborator, the 20ms frame clock that drives the
//! pacer, and the address discovery handshake performed before media flows.

pub mod discovery;
pub mod socket;
pub mod time;

pub use discovery::{discover_address, DiscoveryError, DISCOVERY_TIMEOUT};
pub use socket::{SocketError, Transport, UdpTransport};
pub use time::{format_position, frames_duration, FrameClock, FRAME_DURATION};
