//! Crypto Suites
//!
//! Every suite exposes the same capability: encrypt a payload behind an
//! already-serialized RTP header and advance the sequence number. The packet
//! provider only talks to [`EncryptionStrategy`]; [`CryptoSuite`] is the tagged
//! union of the concrete suites selected by the name negotiated over signaling.

use crate::cipher::CipherError;
use crate::cm_hmac::{self, AesCmHmacSha1};
use crate::gcm::{self, AeadAes256Gcm};
use crate::kdf::MasterKey;
use crate::secretbox::{self, NonceStrategy, XSalsa20Poly1305};
use thiserror::Error;
use voxpipe_protocol::cursor::{ByteWriter, CursorError};
use voxpipe_protocol::rtp::{RtpError, RtpHeader, RtpPacket};

/// Crypto errors
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize { expected: usize, actual: usize },

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("RTP error: {0}")]
    Rtp(#[from] RtpError),

    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Encryption failed")]
    Seal,

    #[error("Nonce counter exhausted")]
    NonceExhausted,

    #[error("Packet too short: need at least {needed} bytes, got {actual}")]
    PacketTooShort { needed: usize, actual: usize },

    #[error("Random number generator failure")]
    Random,

    #[error("Unknown crypto suite: {0}")]
    UnknownSuite(String),

    #[error("Invalid master key encoding: {0}")]
    InvalidMasterKey(String),
}

/// Send-side capability shared by all suites
pub trait EncryptionStrategy {
    /// Suite identifier as negotiated over signaling
    fn name(&self) -> &'static str;

    /// Append the protected form of `payload` to `cursor`.
    ///
    /// The cursor already holds the serialized `header`; suites that
    /// authenticate the header read it back from `cursor.written()`.
    fn encrypt(
        &mut self,
        cursor: &mut ByteWriter,
        header: &RtpHeader,
        payload: &[u8],
    ) -> Result<(), CryptoError>;

    /// Sequence number that follows `previous`
    fn next_sequence(&mut self, previous: u16) -> u16;
}

/// Receive-side counterpart
pub trait DecryptionStrategy {
    /// Authenticate and decrypt a complete datagram
    fn decrypt(&mut self, datagram: &[u8]) -> Result<RtpPacket, CryptoError>;
}

/// Parse the RTP header at the front of a protected datagram
pub(crate) fn split_header(datagram: &[u8]) -> Result<(RtpHeader, usize), CryptoError> {
    let header = RtpHeader::from_bytes(datagram)?;
    let len = header.size();
    Ok((header, len))
}

/// Compare two byte slices without early exit
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Negotiable suite
pub enum CryptoSuite {
    AesCmHmacSha1(AesCmHmacSha1),
    XSalsa20Poly1305(XSalsa20Poly1305),
    AeadAes256Gcm(AeadAes256Gcm),
}

/// Every suite name accepted by [`CryptoSuite::from_name`]
pub const SUITE_NAMES: &[&str] = &[
    cm_hmac::SUITE_NAME,
    secretbox::SUITE_NAME,
    secretbox::SUITE_NAME_SUFFIX,
    secretbox::SUITE_NAME_LITE,
    gcm::SUITE_NAME,
];

impl CryptoSuite {
    /// Build a suite from its signaling name and raw key material.
    ///
    /// `aes_cm_hmac_sha1_80` expects `secret(16) || salt(14)`; the others
    /// expect a 32-byte secret key.
    pub fn from_name(name: &str, key: &[u8]) -> Result<Self, CryptoError> {
        match name {
            cm_hmac::SUITE_NAME => Ok(CryptoSuite::AesCmHmacSha1(AesCmHmacSha1::new(
                &MasterKey::from_bytes(key)?,
            )?)),
            secretbox::SUITE_NAME => Ok(CryptoSuite::XSalsa20Poly1305(XSalsa20Poly1305::new(
                key,
                NonceStrategy::normal(),
            )?)),
            secretbox::SUITE_NAME_SUFFIX => Ok(CryptoSuite::XSalsa20Poly1305(
                XSalsa20Poly1305::new(key, NonceStrategy::suffix())?,
            )),
            secretbox::SUITE_NAME_LITE => Ok(CryptoSuite::XSalsa20Poly1305(
                XSalsa20Poly1305::new(key, NonceStrategy::lite())?,
            )),
            gcm::SUITE_NAME => Ok(CryptoSuite::AeadAes256Gcm(AeadAes256Gcm::new(key)?)),
            other => Err(CryptoError::UnknownSuite(other.to_string())),
        }
    }
}

impl EncryptionStrategy for CryptoSuite {
    fn name(&self) -> &'static str {
        match self {
            CryptoSuite::AesCmHmacSha1(s) => s.name(),
            CryptoSuite::XSalsa20Poly1305(s) => s.name(),
            CryptoSuite::AeadAes256Gcm(s) => s.name(),
        }
    }

    fn encrypt(
        &mut self,
        cursor: &mut ByteWriter,
        header: &RtpHeader,
        payload: &[u8],
    ) -> Result<(), CryptoError> {
        match self {
            CryptoSuite::AesCmHmacSha1(s) => s.encrypt(cursor, header, payload),
            CryptoSuite::XSalsa20Poly1305(s) => s.encrypt(cursor, header, payload),
            CryptoSuite::AeadAes256Gcm(s) => s.encrypt(cursor, header, payload),
        }
    }

    fn next_sequence(&mut self, previous: u16) -> u16 {
        match self {
            CryptoSuite::AesCmHmacSha1(s) => s.next_sequence(previous),
            CryptoSuite::XSalsa20Poly1305(s) => s.next_sequence(previous),
            CryptoSuite::AeadAes256Gcm(s) => s.next_sequence(previous),
        }
    }
}

impl DecryptionStrategy for CryptoSuite {
    fn decrypt(&mut self, datagram: &[u8]) -> Result<RtpPacket, CryptoError> {
        match self {
            CryptoSuite::AesCmHmacSha1(s) => s.decrypt(datagram),
            CryptoSuite::XSalsa20Poly1305(s) => s.decrypt(datagram),
            CryptoSuite::AeadAes256Gcm(s) => s.decrypt(datagram),
        }
    }
}

impl std::fmt::Debug for CryptoSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CryptoSuite({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_all_suites() {
        let master = MasterKey::generate().unwrap().to_bytes();
        let key = [7u8; 32];

        for name in SUITE_NAMES {
            let material: &[u8] = if *name == cm_hmac::SUITE_NAME {
                &master
            } else {
                &key
            };
            let suite = CryptoSuite::from_name(name, material).unwrap();
            assert_eq!(suite.name(), *name);
        }
    }

    #[test]
    fn test_from_name_unknown() {
        assert!(matches!(
            CryptoSuite::from_name("rot13", &[0u8; 32]),
            Err(CryptoError::UnknownSuite(name)) if name == "rot13"
        ));
    }

    #[test]
    fn test_from_name_wrong_key_size() {
        assert!(matches!(
            CryptoSuite::from_name(gcm::SUITE_NAME, &[0u8; 16]),
            Err(CryptoError::InvalidKeySize {
                expected: 32,
                actual: 16
            })
        ));
        assert!(matches!(
            CryptoSuite::from_name(cm_hmac::SUITE_NAME, &[0u8; 32]),
            Err(CryptoError::InvalidKeySize { .. })
        ));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
