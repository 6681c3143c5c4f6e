//! Packet Provider
//!
//! Turns one Opus frame into one wire-ready datagram: assigns the next
//! sequence number and timestamp, serializes the RTP header and lets the
//! connection's crypto suite protect the payload.

use thiserror::Error;
use voxpipe_crypto::{CryptoError, EncryptionStrategy};
use voxpipe_protocol::cursor::ByteWriter;
use voxpipe_protocol::rtp::{RtpError, RtpHeader, SAMPLES_PER_FRAME};

/// Scratch buffer size; comfortably above any Opus frame plus overhead
pub const SCRATCH_SIZE: usize = 2048;

#[derive(Error, Debug)]
pub enum PacketError {
    #[error("RTP error: {0}")]
    Rtp(#[from] RtpError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Per-connection packet state
///
/// Owned by exactly one pacing loop; never shared between connections.
pub struct PacketProvider<S> {
    ssrc: u32,
    sequence: u16,
    timestamp: u32,
    strategy: S,
    cursor: ByteWriter,
}

impl<S: EncryptionStrategy> PacketProvider<S> {
    pub fn new(ssrc: u32, strategy: S) -> Self {
        PacketProvider {
            ssrc,
            sequence: 0,
            timestamp: 0,
            strategy,
            cursor: ByteWriter::with_size(SCRATCH_SIZE),
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Sequence number of the last packet produced (0 before the first)
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Timestamp the next packet will carry
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    fn next_header(&mut self) -> RtpHeader {
        let timestamp = self.timestamp;
        self.timestamp = self.timestamp.wrapping_add(SAMPLES_PER_FRAME);
        self.sequence = self.strategy.next_sequence(self.sequence);

        RtpHeader::new(self.sequence, timestamp, self.ssrc)
    }

    /// Build the protected datagram for `frame`
    pub fn provide(&mut self, frame: &[u8]) -> Result<Vec<u8>, PacketError> {
        self.cursor.clear();

        let header = self.next_header();
        header.write(&mut self.cursor)?;
        self.strategy.encrypt(&mut self.cursor, &header, frame)?;

        tracing::trace!(
            seq = header.sequence,
            ts = header.timestamp,
            len = self.cursor.position(),
            suite = self.strategy.name(),
            "packet"
        );
        Ok(self.cursor.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxpipe_crypto::{AeadAes256Gcm, AesCmHmacSha1, MasterKey};

    /// Copies the payload through untouched
    struct Plaintext;

    impl EncryptionStrategy for Plaintext {
        fn name(&self) -> &'static str {
            "plaintext"
        }

        fn encrypt(
            &mut self,
            cursor: &mut ByteWriter,
            _header: &RtpHeader,
            payload: &[u8],
        ) -> Result<(), CryptoError> {
            cursor.write_bytes(payload)?;
            Ok(())
        }

        fn next_sequence(&mut self, previous: u16) -> u16 {
            previous.wrapping_add(1)
        }
    }

    #[test]
    fn test_first_packets() {
        let mut provider = PacketProvider::new(0x1122_3344, Plaintext);

        let first = provider.provide(&[0xAA]).unwrap();
        assert_eq!(
            first,
            [0x80, 0x78, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44, 0xAA]
        );

        let second = provider.provide(&[0xBB]).unwrap();
        assert_eq!(
            &second[..12],
            &[0x80, 0x78, 0x00, 0x02, 0x00, 0x00, 0x03, 0xC0, 0x11, 0x22, 0x33, 0x44]
        );
        assert_eq!(provider.sequence(), 2);
        assert_eq!(provider.timestamp(), 1920);
    }

    #[test]
    fn test_scratch_does_not_leak_between_packets() {
        let mut provider = PacketProvider::new(1, Plaintext);

        let long = provider.provide(&[0xFF; 100]).unwrap();
        let short = provider.provide(&[0x01]).unwrap();
        assert_eq!(long.len(), 112);
        assert_eq!(short.len(), 13);
    }

    #[test]
    fn test_timestamp_wraps() {
        let mut provider = PacketProvider::new(1, Plaintext);
        provider.timestamp = u32::MAX - 100;

        provider.provide(&[]).unwrap();
        assert_eq!(provider.timestamp(), SAMPLES_PER_FRAME - 101);
    }

    #[test]
    fn test_sequence_follows_suite() {
        let master = MasterKey::generate().unwrap();
        let mut provider = PacketProvider::new(7, AesCmHmacSha1::new(&master).unwrap());
        provider.sequence = u16::MAX;

        let packet = provider.provide(b"frame").unwrap();
        assert_eq!(&packet[2..4], &[0, 0]);
        assert_eq!(provider.strategy().rollover_counter(), 1);
    }

    #[test]
    fn test_oversized_frame() {
        let mut provider = PacketProvider::new(7, AeadAes256Gcm::new(&[0u8; 32]).unwrap());

        assert!(matches!(
            provider.provide(&[0u8; SCRATCH_SIZE]),
            Err(PacketError::Crypto(CryptoError::Cursor(_)))
        ));
    }
}
