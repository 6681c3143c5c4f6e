//! AES Counter Mode + HMAC-SHA1-80 (SRTP)
//!
//! Payloads are encrypted with AES-128 in counter mode. The 16-byte initial
//! counter is laid out as
//!
//! ```text
//! 00 00 00 00 | SSRC (BE) | ROC (BE) | SEQ (BE) 00 00
//! ```
//!
//! with the first 14 bytes XORed with the session salt. An 80-bit tag,
//! the first 10 bytes of HMAC-SHA1 over `header || ciphertext || ROC`, is
//! appended to the packet. Session keys come from [`crate::kdf`].

use crate::kdf::{MasterKey, SessionKeys, SESSION_SALT_LEN};
use crate::suite::{constant_time_eq, split_header, CryptoError, DecryptionStrategy, EncryptionStrategy};
use aes::cipher::{KeyIvInit, StreamCipher};
use ring::hmac;
use voxpipe_protocol::cursor::{ByteWriter, CursorError};
use voxpipe_protocol::rtp::{RtpHeader, RtpPacket};
use voxpipe_protocol::sequence::{packet_index, SeqNumber, SEQ_MODULUS};

pub const SUITE_NAME: &str = "aes_cm_hmac_sha1_80";

/// Initial counter length
pub const COUNTER_LEN: usize = 16;
/// Truncated authentication tag length
pub const AUTH_TAG_LEN: usize = 10;

/// AES-128 keystream incrementing the low 64 bits of the counter
type Aes128Ctr64 = ctr::Ctr64BE<aes::Aes128>;

/// Build the initial counter block for one packet
pub fn generate_counter(
    ssrc: u32,
    roc: u32,
    seq: u16,
    salt: &[u8; SESSION_SALT_LEN],
) -> [u8; COUNTER_LEN] {
    let mut counter = [0u8; COUNTER_LEN];
    counter[4..8].copy_from_slice(&ssrc.to_be_bytes());
    counter[8..12].copy_from_slice(&roc.to_be_bytes());
    counter[12..16].copy_from_slice(&((seq as u32) << 16).to_be_bytes());

    for (byte, salt) in counter.iter_mut().zip(salt) {
        *byte ^= salt;
    }
    counter
}

/// SRTP `AES_CM_128_HMAC_SHA1_80`
pub struct AesCmHmacSha1 {
    keys: SessionKeys,
    auth_key: hmac::Key,
    /// Sender rollover counter
    roc: u32,
    /// Highest sequence number authenticated on receive, with its ROC
    rx_highest: Option<(SeqNumber, u32)>,
}

impl AesCmHmacSha1 {
    /// Derive session keys from `master`
    pub fn new(master: &MasterKey) -> Result<Self, CryptoError> {
        Ok(Self::with_session_keys(SessionKeys::derive(master)?))
    }

    /// Use already-derived session keys
    pub fn with_session_keys(keys: SessionKeys) -> Self {
        let auth_key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, &keys.auth);
        AesCmHmacSha1 {
            keys,
            auth_key,
            roc: 0,
            rx_highest: None,
        }
    }

    /// Current sender rollover counter
    pub fn rollover_counter(&self) -> u32 {
        self.roc
    }

    fn apply_keystream(&self, ssrc: u32, roc: u32, seq: u16, data: &mut [u8]) {
        let counter = generate_counter(ssrc, roc, seq, &self.keys.salt);
        let mut cipher = Aes128Ctr64::new(&self.keys.encryption.into(), &counter.into());
        cipher.apply_keystream(data);
    }

    fn auth_tag(&self, authenticated: &[u8], roc: u32) -> hmac::Tag {
        let mut ctx = hmac::Context::with_key(&self.auth_key);
        ctx.update(authenticated);
        ctx.update(&roc.to_be_bytes());
        ctx.sign()
    }

    /// Guess the sender's ROC for an incoming sequence number (RFC 3711 §3.3.1)
    fn estimate_roc(&self, seq: SeqNumber) -> u32 {
        match self.rx_highest {
            None => 0,
            Some((highest, roc)) => {
                if highest.wraps_to(seq) {
                    roc.wrapping_add(1)
                } else if seq.wraps_to(highest) {
                    // late packet from before the last wrap
                    roc.saturating_sub(1)
                } else {
                    roc
                }
            }
        }
    }

    fn record_received(&mut self, seq: SeqNumber, roc: u32) {
        let index = packet_index(roc, seq.as_raw());
        match self.rx_highest {
            Some((highest, highest_roc)) if packet_index(highest_roc, highest.as_raw()) >= index => {}
            _ => self.rx_highest = Some((seq, roc)),
        }
    }
}

impl EncryptionStrategy for AesCmHmacSha1 {
    fn name(&self) -> &'static str {
        SUITE_NAME
    }

    fn encrypt(
        &mut self,
        cursor: &mut ByteWriter,
        header: &RtpHeader,
        payload: &[u8],
    ) -> Result<(), CryptoError> {
        let needed = payload.len() + AUTH_TAG_LEN;
        if cursor.remaining() < needed {
            return Err(CursorError::BufferTooShort {
                needed,
                available: cursor.remaining(),
            }
            .into());
        }

        let mut body = payload.to_vec();
        self.apply_keystream(header.ssrc, self.roc, header.sequence, &mut body);
        cursor.write_bytes(&body)?;

        let tag = self.auth_tag(cursor.written(), self.roc);
        cursor.write_bytes(&tag.as_ref()[..AUTH_TAG_LEN])?;
        Ok(())
    }

    fn next_sequence(&mut self, previous: u16) -> u16 {
        let next = previous as u32 + 1;
        if next >= SEQ_MODULUS {
            self.roc = self.roc.wrapping_add(1);
            tracing::debug!(roc = self.roc, "sequence number wrapped");
            0
        } else {
            next as u16
        }
    }
}

impl DecryptionStrategy for AesCmHmacSha1 {
    fn decrypt(&mut self, datagram: &[u8]) -> Result<RtpPacket, CryptoError> {
        let (header, header_len) = split_header(datagram)?;
        if datagram.len() < header_len + AUTH_TAG_LEN {
            return Err(CryptoError::PacketTooShort {
                needed: header_len + AUTH_TAG_LEN,
                actual: datagram.len(),
            });
        }

        let (authenticated, tag) = datagram.split_at(datagram.len() - AUTH_TAG_LEN);
        let seq = SeqNumber::new(header.sequence);
        let roc = self.estimate_roc(seq);

        let expected = self.auth_tag(authenticated, roc);
        if !constant_time_eq(&expected.as_ref()[..AUTH_TAG_LEN], tag) {
            return Err(CryptoError::AuthenticationFailed);
        }

        let mut body = authenticated[header_len..].to_vec();
        self.apply_keystream(header.ssrc, roc, header.sequence, &mut body);
        self.record_received(seq, roc);

        Ok(RtpPacket::from_payload(header, &body)?)
    }
}
