//! Voxpipe - secure RTP voice pipeline
//!
//! Paces Opus frames onto the network as encrypted RTP datagrams.
//!
//! ```text
//! frame source ─▶ FramePacer ─▶ PacketProvider ─▶ CryptoSuite ─▶ Transport
//! ```

pub mod pacer;
pub mod provider;
pub mod session;
pub mod source;

pub use voxpipe_crypto as crypto;
pub use voxpipe_io as io;
pub use voxpipe_protocol as protocol;

pub use pacer::{FramePacer, PacerError, PacerStats, SpeakingState, SILENCE_BUDGET, SILENT_FRAME};
pub use provider::{PacketError, PacketProvider};
pub use session::{LocalSession, SessionDescription, SessionError, VoiceSession};
