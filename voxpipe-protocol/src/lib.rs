//! Voxpipe Protocol Core
//!
//! Byte cursors, the RTP header/packet codec and 16-bit RTP sequence
//! arithmetic shared by the crypto suites and the packet pipeline.

pub mod cursor;
pub mod rtp;
pub mod sequence;

pub use cursor::{ByteReader, ByteWriter, CursorError, Endianness};
pub use rtp::{RtpError, RtpHeader, RtpPacket, OPUS_PAYLOAD_TYPE, RTP_HEADER_SIZE};
pub use sequence::SeqNumber;
