//! SRTP Key Derivation
//!
//! Session keys are never used directly from the master key. Each one is
//! produced by an AES-based PRF (RFC 3711 §4.3.1 with a key derivation rate
//! of zero): the master salt is copied into a 16-byte block, the label is
//! XORed into byte 7, and successive blocks are produced by writing a 16-bit
//! big-endian block index into the last two bytes and encrypting with the
//! master secret.

use crate::cipher::{Aes, BLOCK_SIZE};
use crate::suite::CryptoError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;

/// Master secret length (AES-128)
pub const MASTER_SECRET_LEN: usize = 16;
/// Master salt length
pub const MASTER_SALT_LEN: usize = 14;

/// Label for the session encryption key
pub const LABEL_ENCRYPTION: u8 = 0x00;
/// Label for the session authentication key
pub const LABEL_AUTH: u8 = 0x01;
/// Label for the session salt
pub const LABEL_SALT: u8 = 0x02;

/// Session encryption key length
pub const SESSION_KEY_LEN: usize = 16;
/// Session authentication key length (HMAC-SHA1)
pub const SESSION_AUTH_LEN: usize = 20;
/// Session salt length
pub const SESSION_SALT_LEN: usize = 14;

/// Long-lived master key material
///
/// Exchanged out of band as base64 of `secret(16) || salt(14)`.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey {
    secret: [u8; MASTER_SECRET_LEN],
    salt: [u8; MASTER_SALT_LEN],
}

impl MasterKey {
    pub fn new(secret: [u8; MASTER_SECRET_LEN], salt: [u8; MASTER_SALT_LEN]) -> Self {
        MasterKey { secret, salt }
    }

    /// Generate a fresh random secret and salt
    pub fn generate() -> Result<Self, CryptoError> {
        let rng = SystemRandom::new();
        let mut secret = [0u8; MASTER_SECRET_LEN];
        let mut salt = [0u8; MASTER_SALT_LEN];
        rng.fill(&mut secret).map_err(|_| CryptoError::Random)?;
        rng.fill(&mut salt).map_err(|_| CryptoError::Random)?;
        Ok(MasterKey { secret, salt })
    }

    /// Parse `secret || salt`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != MASTER_SECRET_LEN + MASTER_SALT_LEN {
            return Err(CryptoError::InvalidKeySize {
                expected: MASTER_SECRET_LEN + MASTER_SALT_LEN,
                actual: bytes.len(),
            });
        }

        let mut secret = [0u8; MASTER_SECRET_LEN];
        let mut salt = [0u8; MASTER_SALT_LEN];
        secret.copy_from_slice(&bytes[..MASTER_SECRET_LEN]);
        salt.copy_from_slice(&bytes[MASTER_SECRET_LEN..]);
        Ok(MasterKey { secret, salt })
    }

    /// Serialize as `secret || salt`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MASTER_SECRET_LEN + MASTER_SALT_LEN);
        bytes.extend_from_slice(&self.secret);
        bytes.extend_from_slice(&self.salt);
        bytes
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidMasterKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn secret(&self) -> &[u8; MASTER_SECRET_LEN] {
        &self.secret
    }

    pub fn salt(&self) -> &[u8; MASTER_SALT_LEN] {
        &self.salt
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey").finish_non_exhaustive()
    }
}

/// Derive `len` bytes of key material for `label`
pub fn derive_key(master: &MasterKey, label: u8, len: usize) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes::new(&master.secret)?;

    let mut x = [0u8; BLOCK_SIZE];
    x[..MASTER_SALT_LEN].copy_from_slice(&master.salt);
    x[7] ^= label;

    let blocks = len.div_ceil(BLOCK_SIZE);
    let mut output = Vec::with_capacity(blocks * BLOCK_SIZE);
    for index in 0..blocks {
        x[BLOCK_SIZE - 2..].copy_from_slice(&(index as u16).to_be_bytes());

        let mut block = x;
        cipher.encrypt_block(&mut block);
        output.extend_from_slice(&block);
    }

    output.truncate(len);
    Ok(output)
}

/// Per-session keys derived once from a [`MasterKey`]
#[derive(Clone)]
pub struct SessionKeys {
    pub encryption: [u8; SESSION_KEY_LEN],
    pub auth: [u8; SESSION_AUTH_LEN],
    pub salt: [u8; SESSION_SALT_LEN],
}

impl SessionKeys {
    pub fn derive(master: &MasterKey) -> Result<Self, CryptoError> {
        let mut keys = SessionKeys {
            encryption: [0u8; SESSION_KEY_LEN],
            auth: [0u8; SESSION_AUTH_LEN],
            salt: [0u8; SESSION_SALT_LEN],
        };

        keys.encryption
            .copy_from_slice(&derive_key(master, LABEL_ENCRYPTION, SESSION_KEY_LEN)?);
        keys.auth
            .copy_from_slice(&derive_key(master, LABEL_AUTH, SESSION_AUTH_LEN)?);
        keys.salt
            .copy_from_slice(&derive_key(master, LABEL_SALT, SESSION_SALT_LEN)?);

        Ok(keys)
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}
