//! AEAD AES-256-GCM
//!
//! The 12-byte nonce holds a 32-bit little-endian counter in its first four
//! bytes; the rest is zero. The serialized RTP header is the additional
//! authenticated data. Wire layout after the header is
//! `ciphertext || tag(16) || counter (LE, 4 bytes)`.

use crate::suite::{split_header, CryptoError, DecryptionStrategy, EncryptionStrategy};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use voxpipe_protocol::cursor::{ByteReader, ByteWriter, CursorError, Endianness};
use voxpipe_protocol::rtp::{RtpHeader, RtpPacket};

pub const SUITE_NAME: &str = "aead_aes256_gcm";

pub const KEY_LEN: usize = 32;
pub const TAG_LEN: usize = 16;
/// Bytes of the nonce counter carried on the wire
pub const COUNTER_LEN: usize = 4;

pub struct AeadAes256Gcm {
    key: LessSafeKey,
    /// Counter for the next outgoing packet; `None` once all 2^32 values are used
    counter: Option<u32>,
    nonce: ByteWriter,
}

impl AeadAes256Gcm {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| CryptoError::InvalidKeySize {
            expected: KEY_LEN,
            actual: key.len(),
        })?;

        Ok(AeadAes256Gcm {
            key: LessSafeKey::new(unbound),
            counter: Some(0),
            nonce: ByteWriter::with_endianness(NONCE_LEN, Endianness::Little),
        })
    }

    fn build_nonce(&mut self, counter: u32) -> Result<Nonce, CryptoError> {
        self.nonce.clear();
        self.nonce.write_u32(counter)?;

        let mut bytes = [0u8; NONCE_LEN];
        bytes.copy_from_slice(self.nonce.as_bytes());
        Ok(Nonce::assume_unique_for_key(bytes))
    }
}

impl EncryptionStrategy for AeadAes256Gcm {
    fn name(&self) -> &'static str {
        SUITE_NAME
    }

    fn encrypt(
        &mut self,
        cursor: &mut ByteWriter,
        _header: &RtpHeader,
        payload: &[u8],
    ) -> Result<(), CryptoError> {
        let needed = payload.len() + TAG_LEN + COUNTER_LEN;
        if cursor.remaining() < needed {
            return Err(CursorError::BufferTooShort {
                needed,
                available: cursor.remaining(),
            }
            .into());
        }

        let counter = self.counter.ok_or(CryptoError::NonceExhausted)?;
        let nonce = self.build_nonce(counter)?;

        let mut sealed = payload.to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::from(cursor.written()), &mut sealed)
            .map_err(|_| CryptoError::Seal)?;

        cursor.write_bytes(&sealed)?;
        cursor.write_u32_with(counter, Endianness::Little)?;

        self.counter = counter.checked_add(1);
        Ok(())
    }

    fn next_sequence(&mut self, previous: u16) -> u16 {
        previous.wrapping_add(1)
    }
}

impl DecryptionStrategy for AeadAes256Gcm {
    fn decrypt(&mut self, datagram: &[u8]) -> Result<RtpPacket, CryptoError> {
        let (header, header_len) = split_header(datagram)?;
        let needed = header_len + TAG_LEN + COUNTER_LEN;
        if datagram.len() < needed {
            return Err(CryptoError::PacketTooShort {
                needed,
                actual: datagram.len(),
            });
        }

        let (sealed, counter) = datagram.split_at(datagram.len() - COUNTER_LEN);
        let counter = ByteReader::new(counter).read_u32_le()?;
        let nonce = self.build_nonce(counter)?;

        let mut body = sealed[header_len..].to_vec();
        let plain_len = self
            .key
            .open_in_place(nonce, Aad::from(&datagram[..header_len]), &mut body)
            .map_err(|_| CryptoError::AuthenticationFailed)?
            .len();
        body.truncate(plain_len);

        Ok(RtpPacket::from_payload(header, &body)?)
    }
}
