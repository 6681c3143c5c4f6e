//! Voxpipe Encryption
//!
//! Crypto suites protecting RTP payloads. Every suite implements
//! [`EncryptionStrategy`] (and [`DecryptionStrategy`] for the receive side);
//! [`CryptoSuite`] selects one by its negotiated name.
//!
//! - `aes_cm_hmac_sha1_80`: SRTP AES counter mode with an 80-bit HMAC-SHA1
//!   tag, session keys derived from a [`MasterKey`]
//! - `xsalsa20_poly1305`, `_suffix`, `_lite`: NaCl secretbox with three nonce
//!   strategies
//! - `aead_aes256_gcm`: AES-256-GCM with a 32-bit nonce counter

pub mod cipher;
pub mod cm_hmac;
pub mod gcm;
pub mod kdf;
pub mod secretbox;
pub mod suite;

pub use cipher::{Aes, CipherError};
pub use cm_hmac::AesCmHmacSha1;
pub use gcm::AeadAes256Gcm;
pub use kdf::{MasterKey, SessionKeys};
pub use secretbox::{NonceStrategy, XSalsa20Poly1305};
pub use suite::{CryptoError, CryptoSuite, DecryptionStrategy, EncryptionStrategy, SUITE_NAMES};
