//! Signaling session collaborator
//!
//! Signaling (gateway connections, session negotiation) lives outside this
//! crate. The pacer only needs to tell it when the speaking state changes;
//! [`SessionDescription`] carries what negotiation produced.

use async_trait::async_trait;
use thiserror::Error;
use voxpipe_crypto::{CryptoError, CryptoSuite};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Signaling failure: {0}")]
    Signaling(String),

    #[error("Session closed")]
    Closed,
}

/// Voice session as seen from the media pipeline
#[async_trait]
pub trait VoiceSession: Send + Sync {
    /// Announce that this client started or stopped speaking
    async fn update_speaking(&self, speaking: bool) -> Result<(), SessionError>;
}

/// Session with no signaling peer; speaking updates are only logged
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSession;

#[async_trait]
impl VoiceSession for LocalSession {
    async fn update_speaking(&self, speaking: bool) -> Result<(), SessionError> {
        tracing::debug!(speaking, "speaking state (local session)");
        Ok(())
    }
}

/// Parameters delivered by signaling
#[derive(Clone)]
pub struct SessionDescription {
    pub ssrc: u32,
    /// Negotiated suite name
    pub suite: String,
    /// Secret key material for the suite
    pub secret: Vec<u8>,
}

impl SessionDescription {
    /// Instantiate the negotiated crypto suite
    pub fn crypto_suite(&self) -> Result<CryptoSuite, CryptoError> {
        CryptoSuite::from_name(&self.suite, &self.secret)
    }
}

impl std::fmt::Debug for SessionDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDescription")
            .field("ssrc", &self.ssrc)
            .field("suite", &self.suite)
            .finish_non_exhaustive()
    }
}
