//! RTP Header and Packet Codec
//!
//! Implements the fixed 12-byte RTP header (RFC 3550 §5.1) followed by an
//! optional list of contributing-source identifiers:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! |            contributing source (CSRC) identifiers             |
//! |                             ....                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Padding is self-describing: the last padding byte holds the padding length.

use crate::cursor::{ByteReader, ByteWriter, CursorError};
use bytes::Bytes;
use thiserror::Error;

/// Size of the fixed RTP header in bytes
pub const RTP_HEADER_SIZE: usize = 12;

/// RTP protocol version
pub const RTP_VERSION: u8 = 2;

/// Maximum number of CSRC identifiers (4-bit count)
pub const MAX_CSRC_COUNT: usize = 15;

/// Dynamic payload type used for Opus voice frames
pub const OPUS_PAYLOAD_TYPE: u8 = 0x78;

/// RTP timestamp increment for one 20ms frame of 48kHz audio
pub const SAMPLES_PER_FRAME: u32 = 960;

const PADDING_FLAG: u8 = 0x20;
const EXTENSION_FLAG: u8 = 0x10;
const MARKER_FLAG: u8 = 0x80;

/// RTP codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RtpError {
    #[error("Buffer too short: need {needed} bytes, {available} available")]
    BufferTooShort { needed: usize, available: usize },

    #[error("Insufficient bytes: need {needed} bytes, got {available}")]
    InsufficientBytes { needed: usize, available: usize },

    #[error("Too many CSRC identifiers: {0} (max 15)")]
    TooManyCsrcs(usize),

    #[error("Invalid padding length {padding} for {available} payload bytes")]
    InvalidPadding { padding: usize, available: usize },
}

impl From<CursorError> for RtpError {
    fn from(err: CursorError) -> Self {
        match err {
            CursorError::BufferTooShort { needed, available } => {
                RtpError::BufferTooShort { needed, available }
            }
            CursorError::InsufficientBytes { needed, available } => {
                RtpError::InsufficientBytes { needed, available }
            }
        }
    }
}

/// RTP header
///
/// The CSRC count on the wire is always the length of `csrc_identifiers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    /// Protocol version (2 bits)
    pub version: u8,
    /// Padding flag
    pub padding: bool,
    /// Header extension flag
    pub extension: bool,
    /// Marker bit
    pub marker: bool,
    /// Payload type (7 bits)
    pub payload_type: u8,
    /// Sequence number, wraps at 2^16
    pub sequence: u16,
    /// Media timestamp, wraps at 2^32
    pub timestamp: u32,
    /// Synchronization source
    pub ssrc: u32,
    /// Contributing sources
    pub csrc_identifiers: Vec<u32>,
}

impl RtpHeader {
    /// Create a version 2 Opus header with no flags and no CSRCs
    pub fn new(sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        RtpHeader {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            marker: false,
            payload_type: OPUS_PAYLOAD_TYPE,
            sequence,
            timestamp,
            ssrc,
            csrc_identifiers: Vec::new(),
        }
    }

    /// Number of CSRC identifiers
    #[inline]
    pub fn csrc_count(&self) -> usize {
        self.csrc_identifiers.len()
    }

    /// Serialized size of this header
    #[inline]
    pub fn size(&self) -> usize {
        RTP_HEADER_SIZE + 4 * self.csrc_count()
    }

    /// Serialize the header at the writer's position.
    ///
    /// Capacity is checked up front so a failed write leaves the writer untouched.
    pub fn write(&self, writer: &mut ByteWriter) -> Result<(), RtpError> {
        if self.csrc_count() > MAX_CSRC_COUNT {
            return Err(RtpError::TooManyCsrcs(self.csrc_count()));
        }

        let needed = self.size();
        if writer.remaining() < needed {
            return Err(RtpError::BufferTooShort {
                needed,
                available: writer.remaining(),
            });
        }

        let mut first = (self.version & 0x03) << 6 | self.csrc_count() as u8;
        if self.padding {
            first |= PADDING_FLAG;
        }
        if self.extension {
            first |= EXTENSION_FLAG;
        }

        let mut second = self.payload_type & 0x7F;
        if self.marker {
            second |= MARKER_FLAG;
        }

        writer
            .write_u8(first)?
            .write_u8(second)?
            .write_u16(self.sequence)?
            .write_u32(self.timestamp)?
            .write_u32(self.ssrc)?;

        for csrc in &self.csrc_identifiers {
            writer.write_u32(*csrc)?;
        }

        Ok(())
    }

    /// Parse a header from the reader's position
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self, RtpError> {
        if reader.remaining() < RTP_HEADER_SIZE {
            return Err(RtpError::InsufficientBytes {
                needed: RTP_HEADER_SIZE,
                available: reader.remaining(),
            });
        }

        let first = reader.read_u8()?;
        let second = reader.read_u8()?;
        let sequence = reader.read_u16()?;
        let timestamp = reader.read_u32()?;
        let ssrc = reader.read_u32()?;

        let csrc_count = (first & 0x0F) as usize;
        let mut csrc_identifiers = Vec::with_capacity(csrc_count);
        for _ in 0..csrc_count {
            csrc_identifiers.push(reader.read_u32()?);
        }

        Ok(RtpHeader {
            version: (first & 0xC0) >> 6,
            padding: first & PADDING_FLAG != 0,
            extension: first & EXTENSION_FLAG != 0,
            marker: second & MARKER_FLAG != 0,
            payload_type: second & 0x7F,
            sequence,
            timestamp,
            ssrc,
            csrc_identifiers,
        })
    }

    /// Serialize into a freshly allocated buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>, RtpError> {
        let mut writer = ByteWriter::with_size(self.size());
        self.write(&mut writer)?;
        Ok(writer.to_vec())
    }

    /// Parse a header from the start of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RtpError> {
        Self::read(&mut ByteReader::new(bytes))
    }
}

/// RTP packet: header, body and trailing padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub header: RtpHeader,
    pub body: Bytes,
    /// Number of padding bytes, including the trailing length byte
    pub padding: u8,
}

impl RtpPacket {
    /// Create a packet; the header's padding flag follows `padding`
    pub fn new(mut header: RtpHeader, body: Bytes, padding: u8) -> Self {
        header.padding = padding > 0;
        RtpPacket {
            header,
            body,
            padding,
        }
    }

    /// Total serialized size
    pub fn size(&self) -> usize {
        self.header.size() + self.body.len() + self.padding as usize
    }

    /// Serialize the packet at the writer's position
    pub fn write(&self, writer: &mut ByteWriter) -> Result<(), RtpError> {
        let needed = self.size();
        if writer.remaining() < needed {
            return Err(RtpError::BufferTooShort {
                needed,
                available: writer.remaining(),
            });
        }

        // The padding flag follows the padding actually written
        let mut header = self.header.clone();
        header.padding = self.padding > 0;
        header.write(writer)?;
        writer.write_bytes(&self.body)?;
        if self.padding > 0 {
            writer.write_zeros(self.padding as usize - 1)?;
            writer.write_u8(self.padding)?;
        }

        Ok(())
    }

    /// Parse a packet, consuming the rest of the reader
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self, RtpError> {
        let header = RtpHeader::read(reader)?;
        let payload = reader.read_remaining();
        Self::from_payload(header, payload)
    }

    /// Build a packet from a parsed header and its payload, stripping any
    /// padding the header announces
    pub fn from_payload(header: RtpHeader, payload: &[u8]) -> Result<Self, RtpError> {
        let padding = if header.padding {
            match payload.last() {
                Some(&count) if count > 0 && count as usize <= payload.len() => count,
                other => {
                    return Err(RtpError::InvalidPadding {
                        padding: other.copied().unwrap_or(0) as usize,
                        available: payload.len(),
                    })
                }
            }
        } else {
            0
        };

        let body = Bytes::copy_from_slice(&payload[..payload.len() - padding as usize]);
        Ok(RtpPacket {
            header,
            body,
            padding,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RtpError> {
        let mut writer = ByteWriter::with_size(self.size());
        self.write(&mut writer)?;
        Ok(writer.to_vec())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RtpError> {
        Self::read(&mut ByteReader::new(bytes))
    }
}
