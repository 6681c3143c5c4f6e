//! XSalsa20-Poly1305 (NaCl secretbox)
//!
//! The payload is sealed as `tag(16) || ciphertext` under a 32-byte key.
//! Three nonce strategies decide where the 24-byte nonce comes from and
//! what, if anything, is appended to the packet so the receiver can
//! rebuild it.

use crate::suite::{split_header, CryptoError, DecryptionStrategy, EncryptionStrategy};
use crypto_secretbox::aead::generic_array::GenericArray;
use crypto_secretbox::aead::{AeadInPlace, KeyInit};
use crypto_secretbox::XSalsa20Poly1305 as SecretBox;
use ring::rand::{SecureRandom, SystemRandom};
use voxpipe_protocol::cursor::{ByteReader, ByteWriter, CursorError, Endianness};
use voxpipe_protocol::rtp::{RtpHeader, RtpPacket};

pub const SUITE_NAME: &str = "xsalsa20_poly1305";
pub const SUITE_NAME_SUFFIX: &str = "xsalsa20_poly1305_suffix";
pub const SUITE_NAME_LITE: &str = "xsalsa20_poly1305_lite";

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

/// Length of the counter appended by [`NonceStrategy::Lite`]
pub const LITE_NONCE_LEN: usize = 4;

/// Where the secretbox nonce comes from
pub enum NonceStrategy {
    /// Serialized RTP header, zero-padded. Nothing appended.
    Normal,
    /// 24 random bytes, appended in full
    Suffix(SystemRandom),
    /// Incrementing 32-bit little-endian counter, 4 bytes appended
    Lite { counter: u32 },
}

impl NonceStrategy {
    pub fn normal() -> Self {
        NonceStrategy::Normal
    }

    pub fn suffix() -> Self {
        NonceStrategy::Suffix(SystemRandom::new())
    }

    pub fn lite() -> Self {
        NonceStrategy::Lite { counter: 0 }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NonceStrategy::Normal => SUITE_NAME,
            NonceStrategy::Suffix(_) => SUITE_NAME_SUFFIX,
            NonceStrategy::Lite { .. } => SUITE_NAME_LITE,
        }
    }

    /// Bytes this strategy appends after the sealed payload
    pub fn suffix_len(&self) -> usize {
        match self {
            NonceStrategy::Normal => 0,
            NonceStrategy::Suffix(_) => NONCE_LEN,
            NonceStrategy::Lite { .. } => LITE_NONCE_LEN,
        }
    }

    /// Fill `nonce` for the next outgoing packet
    fn generate(&mut self, nonce: &mut ByteWriter, header: &RtpHeader) -> Result<(), CryptoError> {
        match self {
            NonceStrategy::Normal => {
                // Headers with CSRCs run past the nonce; only the leading bytes count
                let header = header.to_bytes()?;
                nonce.write_bytes(&header[..header.len().min(NONCE_LEN)])?;
            }
            NonceStrategy::Suffix(rng) => {
                let mut random = [0u8; NONCE_LEN];
                rng.fill(&mut random).map_err(|_| CryptoError::Random)?;
                nonce.write_bytes(&random)?;
            }
            NonceStrategy::Lite { counter } => {
                *counter = counter.checked_add(1).ok_or(CryptoError::NonceExhausted)?;
                nonce.write_u32_with(*counter, Endianness::Little)?;
            }
        }
        Ok(())
    }

    /// Rebuild the nonce of an incoming datagram
    fn recover(&self, nonce: &mut ByteWriter, datagram: &[u8], header_len: usize) -> Result<(), CryptoError> {
        let suffix = &datagram[datagram.len() - self.suffix_len()..];
        match self {
            NonceStrategy::Normal => nonce.write_bytes(&datagram[..header_len.min(NONCE_LEN)])?,
            NonceStrategy::Suffix(_) | NonceStrategy::Lite { .. } => nonce.write_bytes(suffix)?,
        };
        Ok(())
    }
}

/// XSalsa20-Poly1305 with a selectable nonce strategy
pub struct XSalsa20Poly1305 {
    cipher: SecretBox,
    strategy: NonceStrategy,
    nonce: ByteWriter,
}

impl XSalsa20Poly1305 {
    pub fn new(key: &[u8], strategy: NonceStrategy) -> Result<Self, CryptoError> {
        let cipher = SecretBox::new_from_slice(key).map_err(|_| CryptoError::InvalidKeySize {
            expected: KEY_LEN,
            actual: key.len(),
        })?;

        Ok(XSalsa20Poly1305 {
            cipher,
            strategy,
            nonce: ByteWriter::with_size(NONCE_LEN),
        })
    }

    pub fn strategy(&self) -> &NonceStrategy {
        &self.strategy
    }
}

impl EncryptionStrategy for XSalsa20Poly1305 {
    fn name(&self) -> &'static str {
        self.strategy.name()
    }

    fn encrypt(
        &mut self,
        cursor: &mut ByteWriter,
        header: &RtpHeader,
        payload: &[u8],
    ) -> Result<(), CryptoError> {
        let needed = TAG_LEN + payload.len() + self.strategy.suffix_len();
        if cursor.remaining() < needed {
            return Err(CursorError::BufferTooShort {
                needed,
                available: cursor.remaining(),
            }
            .into());
        }

        self.nonce.clear();
        self.strategy.generate(&mut self.nonce, header)?;

        let mut sealed = payload.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(GenericArray::from_slice(self.nonce.as_bytes()), &[], &mut sealed)
            .map_err(|_| CryptoError::Seal)?;

        cursor.write_bytes(&tag)?;
        cursor.write_bytes(&sealed)?;

        match self.strategy {
            NonceStrategy::Normal => {}
            NonceStrategy::Suffix(_) => {
                cursor.write_bytes(self.nonce.as_bytes())?;
            }
            NonceStrategy::Lite { .. } => {
                cursor.write_bytes(&self.nonce.as_bytes()[..LITE_NONCE_LEN])?;
            }
        }
        Ok(())
    }

    fn next_sequence(&mut self, previous: u16) -> u16 {
        previous.wrapping_add(1)
    }
}

impl DecryptionStrategy for XSalsa20Poly1305 {
    fn decrypt(&mut self, datagram: &[u8]) -> Result<RtpPacket, CryptoError> {
        let (header, header_len) = split_header(datagram)?;
        let needed = header_len + TAG_LEN + self.strategy.suffix_len();
        if datagram.len() < needed {
            return Err(CryptoError::PacketTooShort {
                needed,
                actual: datagram.len(),
            });
        }

        self.nonce.clear();
        self.strategy.recover(&mut self.nonce, datagram, header_len)?;

        let mut reader = ByteReader::new(&datagram[header_len..datagram.len() - self.strategy.suffix_len()]);
        let tag = reader.read_bytes(TAG_LEN)?;
        let mut body = reader.read_remaining().to_vec();

        self.cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(self.nonce.as_bytes()),
                &[],
                &mut body,
                GenericArray::from_slice(tag),
            )
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        Ok(RtpPacket::from_payload(header, &body)?)
    }
}
